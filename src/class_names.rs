use crate::{ClassFileResult, ParsedClass};
use java_string::JavaString;
use log::warn;

impl<'class> ParsedClass<'class> {
    fn owned_class_name(&self, class_index: u16) -> ClassFileResult<JavaString> {
        Ok(self.constant_pool.get_class(class_index)?.into_owned())
    }

    pub fn try_class_name(&self) -> ClassFileResult<JavaString> {
        self.owned_class_name(self.this_class_index())
    }

    /// The internal name of this class, e.g. `java/lang/String`.
    ///
    /// Failures are logged and reported as `None`.
    pub fn class_name(&self) -> Option<JavaString> {
        self.try_class_name()
            .inspect_err(|err| {
                warn!(
                    "failed to resolve class name at index {}: {err}",
                    self.this_class_index()
                )
            })
            .ok()
    }

    /// `Ok(None)` only when `super_class` is 0, which is the case for `java/lang/Object`.
    pub fn try_super_class_name(&self) -> ClassFileResult<Option<JavaString>> {
        match self.super_class_index() {
            0 => Ok(None),
            index => self.owned_class_name(index).map(Some),
        }
    }

    pub fn super_class_name(&self) -> Option<JavaString> {
        self.try_super_class_name()
            .inspect_err(|err| {
                warn!(
                    "failed to resolve superclass name at index {}: {err}",
                    self.super_class_index()
                )
            })
            .ok()
            .flatten()
    }

    /// Index 1 never names a meaningful superclass, so only indices above it count.
    pub fn has_super_class(&self) -> bool {
        self.super_class_index() > 1
    }

    pub fn interface_count(&self) -> usize {
        self.interfaces_count() as usize
    }

    pub fn interface_name(&self, index: usize) -> ClassFileResult<JavaString> {
        self.interface_index(index)
            .and_then(|class_index| self.owned_class_name(class_index))
            .inspect_err(|err| warn!("failed to resolve interface {index}: {err}"))
    }

    pub fn interface_names(&self) -> InterfaceNames<'_, 'class> {
        InterfaceNames {
            class: self,
            index: 0,
        }
    }

    /// Classes that have to be loaded before this one: the superclass, if it
    /// has a meaningful one, followed by every interface. Names that cannot be
    /// resolved are skipped.
    pub fn dependent_class_names(&self) -> Vec<JavaString> {
        let mut names = Vec::with_capacity(self.interface_count() + 1);
        if self.has_super_class() {
            names.extend(self.super_class_name());
        }
        names.extend(self.interface_names().filter_map(Result::ok));
        names
    }
}

#[derive(Debug, Copy, Clone)]
pub struct InterfaceNames<'a, 'class> {
    class: &'a ParsedClass<'class>,
    index: usize,
}

impl Iterator for InterfaceNames<'_, '_> {
    type Item = ClassFileResult<JavaString>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.index >= self.class.interface_count() {
            return None;
        }

        let index = self.index;
        self.index += 1;
        Some(self.class.interface_name(index))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.class.interface_count() - self.index;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for InterfaceNames<'_, '_> {}
