use crate::{ClassBuffer, ClassFileError, ClassFileResult, ScanOptions, UnknownTagPolicy};
use derive_more::IsVariant;
use java_string::JavaStr;
use log::warn;
use std::borrow::Cow;
use strum::{Display, FromRepr};

/// Offset of the first constant pool entry in a class file.
pub const CONSTANT_POOL_START: usize = 10;

/// Payload size assumed for tags under [`UnknownTagPolicy::AssumeFourBytes`].
const UNKNOWN_TAG_PAYLOAD_LEN: usize = 4;

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Display, FromRepr)]
#[repr(u8)]
#[non_exhaustive]
pub enum ConstantPoolTag {
    Utf8 = 1,
    Integer = 3,
    Float = 4,
    Long = 5,
    Double = 6,
    Class = 7,
    String = 8,
    FieldRef = 9,
    MethodRef = 10,
    InterfaceMethodRef = 11,
    NameAndType = 12,
    MethodHandle = 15,
    MethodType = 16,
    Dynamic = 17,
    InvokeDynamic = 18,
    Module = 19,
    Package = 20,
}

impl ConstantPoolTag {
    pub fn from_u8(tag: u8) -> ClassFileResult<ConstantPoolTag> {
        Self::from_repr(tag).ok_or(ClassFileError::BadConstantPoolTag(tag))
    }

    /// Long and Double entries take up two constant pool indices.
    pub fn is_wide(self) -> bool {
        matches!(self, ConstantPoolTag::Long | ConstantPoolTag::Double)
    }

    /// Size of the entry after its tag byte, or `None` for Utf8 entries whose
    /// size comes from their own length prefix.
    pub fn fixed_payload_len(self) -> Option<usize> {
        match self {
            ConstantPoolTag::Utf8 => None,
            ConstantPoolTag::Class
            | ConstantPoolTag::MethodType
            | ConstantPoolTag::Module
            | ConstantPoolTag::String
            | ConstantPoolTag::Package => Some(2),
            ConstantPoolTag::MethodHandle => Some(3),
            ConstantPoolTag::Dynamic
            | ConstantPoolTag::FieldRef
            | ConstantPoolTag::Float
            | ConstantPoolTag::Integer
            | ConstantPoolTag::InterfaceMethodRef
            | ConstantPoolTag::InvokeDynamic
            | ConstantPoolTag::MethodRef
            | ConstantPoolTag::NameAndType => Some(4),
            ConstantPoolTag::Double | ConstantPoolTag::Long => Some(8),
        }
    }
}

/// A raw view of one constant pool entry. Indices are left unresolved.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, IsVariant)]
#[non_exhaustive]
pub enum ConstantPoolEntry<'class> {
    Utf8(&'class [u8]),
    Class {
        name_index: u16,
    },
    String {
        string_index: u16,
    },
    MethodType {
        descriptor_index: u16,
    },
    MethodHandle {
        reference_kind: u8,
        reference_index: u16,
    },
    Module {
        name_index: u16,
    },
    Package {
        name_index: u16,
    },
    LongOrDouble {
        tag: ConstantPoolTag,
        high: u32,
        low: u32,
    },
    /// Integer, Float, and the member/name-and-type/dynamic references.
    Other4Byte {
        tag: ConstantPoolTag,
        data: [u8; 4],
    },
    /// Only produced under [`UnknownTagPolicy::AssumeFourBytes`].
    Unknown {
        tag: u8,
        data: [u8; 4],
    },
}

#[derive(Debug, Clone)]
pub struct ConstantPool<'class> {
    buffer: ClassBuffer<'class>,
    // 0 marks index 0 and the second slot of Long/Double entries
    offset: Box<[usize]>,
    end: usize,
}

impl<'class> ConstantPool<'class> {
    /// Indexes the pool in one pass, returning it together with the offset of
    /// the first byte after it.
    pub(crate) fn new(
        buffer: ClassBuffer<'class>,
        options: ScanOptions,
    ) -> ClassFileResult<(ConstantPool<'class>, usize)> {
        let constant_pool_count = buffer.read_u16(8)? as usize;
        let mut cp_offset = Vec::new();
        cp_offset
            .try_reserve_exact(constant_pool_count)
            .map_err(ClassFileError::AllocationFailed)?;
        cp_offset.resize(constant_pool_count, 0);

        let mut current_offset = CONSTANT_POOL_START;
        let mut i = 1;
        while i < constant_pool_count {
            cp_offset[i] = current_offset;
            let raw_tag = buffer.read_u8(current_offset)?;
            let payload_len = match ConstantPoolTag::from_repr(raw_tag) {
                Some(ConstantPoolTag::Utf8) => 2 + buffer.read_u16(current_offset + 1)? as usize,
                Some(tag) => {
                    if tag.is_wide() {
                        i += 1;
                    }
                    tag.fixed_payload_len().unwrap_or_default()
                }
                None => match options.unknown_tags {
                    UnknownTagPolicy::Reject => {
                        return Err(ClassFileError::BadConstantPoolTag(raw_tag));
                    }
                    UnknownTagPolicy::AssumeFourBytes => {
                        warn!(
                            "unknown constant pool tag {raw_tag} at index {i}, assuming {UNKNOWN_TAG_PAYLOAD_LEN} bytes"
                        );
                        UNKNOWN_TAG_PAYLOAD_LEN
                    }
                },
            };
            current_offset += 1 + payload_len;
            if current_offset > buffer.len() {
                return Err(ClassFileError::OutOfBounds {
                    index: current_offset - 1,
                    len: buffer.len(),
                });
            }
            i += 1;
        }

        let constant_pool = ConstantPool {
            buffer,
            offset: cp_offset.into_boxed_slice(),
            end: current_offset,
        };
        Ok((constant_pool, current_offset))
    }

    /// The declared `constant_pool_count`; valid indices are `1..len()`.
    pub fn len(&self) -> usize {
        self.offset.len()
    }

    pub fn is_empty(&self) -> bool {
        self.offset.len() <= 1
    }

    pub fn byte_size(&self) -> usize {
        self.end - CONSTANT_POOL_START
    }

    fn index_to_offset(&self, index: u16) -> ClassFileResult<usize> {
        match self.offset.get(index as usize) {
            Some(&0) => Err(ClassFileError::BadConstantPoolIndexNoEntry(index)),
            Some(&offset) => Ok(offset),
            None => Err(ClassFileError::BadConstantPoolIndex {
                index,
                len: self.offset.len(),
            }),
        }
    }

    fn tag_at(&self, index: u16, offset: usize) -> ClassFileResult<ConstantPoolTag> {
        let tag = self.buffer.read_u8(offset)?;
        // only reachable for slots kept under UnknownTagPolicy::AssumeFourBytes
        ConstantPoolTag::from_repr(tag)
            .ok_or(ClassFileError::UnknownConstantPoolType { index, tag })
    }

    pub fn get_type(&self, index: u16) -> ClassFileResult<ConstantPoolTag> {
        let offset = self.index_to_offset(index)?;
        self.tag_at(index, offset)
    }

    fn expect_type(&self, index: u16, expected: ConstantPoolTag) -> ClassFileResult<usize> {
        let offset = self.index_to_offset(index)?;
        let actual = self.tag_at(index, offset)?;
        if actual != expected {
            return Err(ClassFileError::BadConstantPoolType { expected, actual });
        }
        Ok(offset)
    }

    pub fn get(&self, index: u16) -> ClassFileResult<ConstantPoolEntry<'class>> {
        let offset = self.index_to_offset(index)?;
        let raw_tag = self.buffer.read_u8(offset)?;
        let Some(tag) = ConstantPoolTag::from_repr(raw_tag) else {
            return Ok(ConstantPoolEntry::Unknown {
                tag: raw_tag,
                data: self.buffer.read_array(offset + 1)?,
            });
        };

        let payload = offset + 1;
        let entry = match tag {
            ConstantPoolTag::Utf8 => ConstantPoolEntry::Utf8(self.read_utf8(offset)?),
            ConstantPoolTag::Class => ConstantPoolEntry::Class {
                name_index: self.buffer.read_u16(payload)?,
            },
            ConstantPoolTag::String => ConstantPoolEntry::String {
                string_index: self.buffer.read_u16(payload)?,
            },
            ConstantPoolTag::MethodType => ConstantPoolEntry::MethodType {
                descriptor_index: self.buffer.read_u16(payload)?,
            },
            ConstantPoolTag::MethodHandle => ConstantPoolEntry::MethodHandle {
                reference_kind: self.buffer.read_u8(payload)?,
                reference_index: self.buffer.read_u16(payload + 1)?,
            },
            ConstantPoolTag::Module => ConstantPoolEntry::Module {
                name_index: self.buffer.read_u16(payload)?,
            },
            ConstantPoolTag::Package => ConstantPoolEntry::Package {
                name_index: self.buffer.read_u16(payload)?,
            },
            ConstantPoolTag::Long | ConstantPoolTag::Double => ConstantPoolEntry::LongOrDouble {
                tag,
                high: self.buffer.read_u32(payload)?,
                low: self.buffer.read_u32(payload + 4)?,
            },
            ConstantPoolTag::Integer
            | ConstantPoolTag::Float
            | ConstantPoolTag::FieldRef
            | ConstantPoolTag::MethodRef
            | ConstantPoolTag::InterfaceMethodRef
            | ConstantPoolTag::NameAndType
            | ConstantPoolTag::Dynamic
            | ConstantPoolTag::InvokeDynamic => ConstantPoolEntry::Other4Byte {
                tag,
                data: self.buffer.read_array(payload)?,
            },
        };
        Ok(entry)
    }

    fn read_utf8(&self, offset: usize) -> ClassFileResult<&'class [u8]> {
        let len = self.buffer.read_u16(offset + 1)?;
        self.buffer.read_bytes(offset + 3, len as usize)
    }

    /// The undecoded (modified UTF-8) bytes of a Utf8 entry.
    pub fn get_utf8(&self, index: u16) -> ClassFileResult<&'class [u8]> {
        let offset = self.expect_type(index, ConstantPoolTag::Utf8)?;
        self.read_utf8(offset)
    }

    /// Follows a Class entry to the bytes of its name.
    pub fn get_class_name(&self, class_index: u16) -> ClassFileResult<&'class [u8]> {
        let offset = self.expect_type(class_index, ConstantPoolTag::Class)?;
        self.get_utf8(self.buffer.read_u16(offset + 1)?)
    }

    pub fn get_class(&self, class_index: u16) -> ClassFileResult<Cow<'class, JavaStr>> {
        Ok(JavaStr::from_modified_utf8(
            self.get_class_name(class_index)?,
        )?)
    }
}

impl<'a, 'class> IntoIterator for &'a ConstantPool<'class> {
    type Item = (u16, ClassFileResult<ConstantPoolEntry<'class>>);
    type IntoIter = ConstantPoolIntoIter<'a, 'class>;

    fn into_iter(self) -> Self::IntoIter {
        ConstantPoolIntoIter {
            constant_pool: self,
            index: 1,
        }
    }
}

/// Yields every resolvable index with its entry, skipping the second slot of
/// Long/Double entries.
#[derive(Debug, Copy, Clone)]
pub struct ConstantPoolIntoIter<'a, 'class> {
    constant_pool: &'a ConstantPool<'class>,
    index: usize,
}

impl<'class> Iterator for ConstantPoolIntoIter<'_, 'class> {
    type Item = (u16, ClassFileResult<ConstantPoolEntry<'class>>);

    fn next(&mut self) -> Option<Self::Item> {
        let offsets = &self.constant_pool.offset;
        while self.index < offsets.len() && offsets[self.index] == 0 {
            self.index += 1;
        }
        if self.index >= offsets.len() {
            return None;
        }

        let index = self.index as u16;
        self.index += 1;
        Some((index, self.constant_pool.get(index)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        // every remaining entry could be a Long/Double, or none of them
        let remaining = self.constant_pool.offset.len().saturating_sub(self.index);
        (remaining.div_ceil(2), Some(remaining))
    }
}

#[cfg(test)]
mod test {
    use crate::{ClassFileError, ClassFileErrorKind, ConstantPoolEntry, ConstantPoolTag, ParsedClass};
    use test_helpers::ClassFileBuilder;

    /// `[Utf8("A"), Class(1), Long(0, 1), Utf8("B")]`, the Long taking 3 and 4.
    fn shadow_fixture() -> Vec<u8> {
        let mut builder = ClassFileBuilder::new();
        let a = builder.utf8("A");
        let class = builder.class(a);
        builder.long(0, 1);
        builder.utf8("B");
        builder.this_class(class).build()
    }

    #[test]
    fn test_offsets_around_long() {
        let bytes = shadow_fixture();
        let parsed = ParsedClass::build(&bytes).unwrap();
        let pool = &parsed.constant_pool;
        assert_eq!(6, pool.len());

        assert_eq!(ConstantPoolEntry::Utf8(b"A"), pool.get(1).unwrap());
        assert_eq!(ConstantPoolEntry::Class { name_index: 1 }, pool.get(2).unwrap());
        assert_eq!(
            ConstantPoolEntry::LongOrDouble {
                tag: ConstantPoolTag::Long,
                high: 0,
                low: 1
            },
            pool.get(3).unwrap()
        );

        let err = pool.get(4).unwrap_err();
        assert!(matches!(err, ClassFileError::BadConstantPoolIndexNoEntry(4)));
        assert_eq!(ClassFileErrorKind::IndexOutOfRange, err.kind());
        assert!(err.is_lookup());

        assert_eq!(b"B", pool.get_utf8(5).unwrap());
        // 4 + 3 + 9 + 4
        assert_eq!(20, pool.byte_size());
    }

    #[test]
    fn test_out_of_range_indices() {
        let bytes = shadow_fixture();
        let parsed = ParsedClass::build(&bytes).unwrap();
        let pool = &parsed.constant_pool;

        assert!(matches!(
            pool.get(0),
            Err(ClassFileError::BadConstantPoolIndexNoEntry(0))
        ));
        for index in [6, 7, 1000, u16::MAX] {
            let err = pool.get(index).unwrap_err();
            assert!(
                matches!(err, ClassFileError::BadConstantPoolIndex { len: 6, .. }),
                "index {index}"
            );
            assert_eq!(ClassFileErrorKind::IndexOutOfRange, err.kind());
        }
    }

    #[test]
    fn test_typed_accessors() {
        let bytes = shadow_fixture();
        let parsed = ParsedClass::build(&bytes).unwrap();
        let pool = &parsed.constant_pool;

        assert_eq!(b"A", pool.get_class_name(2).unwrap());
        assert_eq!(b"A", pool.get_class(2).unwrap().as_bytes());

        let err = pool.get_utf8(2).unwrap_err();
        assert!(matches!(
            err,
            ClassFileError::BadConstantPoolType {
                expected: ConstantPoolTag::Utf8,
                actual: ConstantPoolTag::Class
            }
        ));
        assert_eq!(ClassFileErrorKind::WrongTag, err.kind());

        assert!(matches!(
            pool.get_class_name(1),
            Err(ClassFileError::BadConstantPoolType {
                expected: ConstantPoolTag::Class,
                actual: ConstantPoolTag::Utf8
            })
        ));
        assert!(matches!(
            pool.get_class_name(4),
            Err(ClassFileError::BadConstantPoolIndexNoEntry(4))
        ));
    }

    #[test]
    fn test_class_pointing_at_non_utf8() {
        let mut builder = ClassFileBuilder::new();
        let value = builder.integer(7);
        let class = builder.class(value);
        let bytes = builder.this_class(class).build();
        let parsed = ParsedClass::build(&bytes).unwrap();

        let err = parsed.constant_pool.get_class_name(class).unwrap_err();
        assert!(matches!(
            err,
            ClassFileError::BadConstantPoolType {
                expected: ConstantPoolTag::Utf8,
                actual: ConstantPoolTag::Integer
            }
        ));
    }

    #[test]
    fn test_every_entry_shape() {
        let mut builder = ClassFileBuilder::new();
        let name = builder.utf8("run");
        let desc = builder.utf8("()V");
        let class = builder.class_named("Task");
        let string = builder.string(name);
        let nat = builder.name_and_type(name, desc);
        let method = builder.method_ref(class, nat);
        let field = builder.field_ref(class, nat);
        let float = builder.float(0.5);
        let handle = builder.method_handle(6, method);
        let method_type = builder.method_type(desc);
        let double = builder.double(2.0);
        let module = builder.module(name);
        let package = builder.package(name);
        let tail = builder.utf8("tail");
        let bytes = builder.this_class(class).build();
        let parsed = ParsedClass::build(&bytes).unwrap();
        let pool = &parsed.constant_pool;

        assert_eq!(
            ConstantPoolEntry::String { string_index: name },
            pool.get(string).unwrap()
        );
        assert_eq!(
            ConstantPoolEntry::Other4Byte {
                tag: ConstantPoolTag::NameAndType,
                data: [0, name as u8, 0, desc as u8]
            },
            pool.get(nat).unwrap()
        );
        assert_eq!(ConstantPoolTag::MethodRef, pool.get_type(method).unwrap());
        assert_eq!(
            ConstantPoolEntry::Other4Byte {
                tag: ConstantPoolTag::FieldRef,
                data: [0, class as u8, 0, nat as u8]
            },
            pool.get(field).unwrap()
        );
        assert_eq!(
            ConstantPoolEntry::Other4Byte {
                tag: ConstantPoolTag::Float,
                data: 0.5f32.to_bits().to_be_bytes()
            },
            pool.get(float).unwrap()
        );
        assert_eq!(
            ConstantPoolEntry::MethodHandle {
                reference_kind: 6,
                reference_index: method
            },
            pool.get(handle).unwrap()
        );
        assert_eq!(
            ConstantPoolEntry::MethodType {
                descriptor_index: desc
            },
            pool.get(method_type).unwrap()
        );
        let bits = 2.0f64.to_bits();
        assert_eq!(
            ConstantPoolEntry::LongOrDouble {
                tag: ConstantPoolTag::Double,
                high: (bits >> 32) as u32,
                low: bits as u32
            },
            pool.get(double).unwrap()
        );
        assert_eq!(ConstantPoolEntry::Module { name_index: name }, pool.get(module).unwrap());
        assert_eq!(ConstantPoolEntry::Package { name_index: name }, pool.get(package).unwrap());
        // Module and Package are 2-byte entries; a 4-byte guess would break this lookup
        assert_eq!(b"tail", pool.get_utf8(tail).unwrap());
    }

    #[test]
    fn test_unknown_entry_is_visible() {
        let mut builder = ClassFileBuilder::new();
        let unknown = builder.raw_entry(99, &[1, 2, 3, 4], 1);
        let class = builder.class_named("A");
        let bytes = builder.this_class(class).build();
        let options = crate::ScanOptions {
            unknown_tags: crate::UnknownTagPolicy::AssumeFourBytes,
        };
        let parsed = ParsedClass::build_with(&bytes, options).unwrap();

        assert_eq!(
            ConstantPoolEntry::Unknown {
                tag: 99,
                data: [1, 2, 3, 4]
            },
            parsed.constant_pool.get(unknown).unwrap()
        );
        let err = parsed.constant_pool.get_utf8(unknown).unwrap_err();
        assert!(matches!(
            err,
            ClassFileError::UnknownConstantPoolType { index: 1, tag: 99 }
        ));
        assert_eq!(ClassFileErrorKind::WrongTag, err.kind());
        assert!(err.is_lookup());
        assert!(parsed.constant_pool.get_type(unknown).unwrap_err().is_lookup());
    }

    #[test]
    fn test_iteration_skips_shadow_slots() {
        let bytes = shadow_fixture();
        let parsed = ParsedClass::build(&bytes).unwrap();
        let indices: Vec<u16> = parsed
            .constant_pool
            .into_iter()
            .map(|(index, entry)| {
                assert!(entry.is_ok());
                index
            })
            .collect();
        assert_eq!(vec![1, 2, 3, 5], indices);
        assert!(parsed.constant_pool.get(5).unwrap().is_utf_8());
    }

    #[test]
    fn test_empty_pool() {
        let bytes = ClassFileBuilder::new().build();
        let parsed = ParsedClass::build(&bytes).unwrap();
        assert!(parsed.constant_pool.is_empty());
        assert_eq!(0, parsed.pool_byte_size());
        assert!(parsed.constant_pool.into_iter().next().is_none());
    }
}
