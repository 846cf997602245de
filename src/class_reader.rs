use crate::{ClassFileError, ClassFileResult, ConstantPool};
use bitflags::bitflags;
use log::warn;

pub const CLASS_MAGIC: u32 = 0xcafebabe;

/// magic, minor_version, major_version, constant_pool_count
pub const CLASS_HEADER_SIZE: usize = 10;

/// access_flags, this_class, super_class, interfaces_count
const CLASS_INFO_SIZE: usize = 8;

bitflags! {
    #[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
    pub struct ClassAccess: u16 {
        const Public = 0x0001;
        const Final = 0x0010;
        const Super = 0x0020;
        const Interface = 0x0200;
        const Abstract = 0x0400;
        const Synthetic = 0x1000;
        const Annotation = 0x2000;
        const Enum = 0x4000;
        const Module = 0x8000;
    }
}

/// What to do with a constant pool tag the scanner does not know.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum UnknownTagPolicy {
    /// Fail the scan with [`ClassFileError::BadConstantPoolTag`].
    #[default]
    Reject,
    /// Treat the entry as a 4-byte constant and keep going. The offsets of
    /// every later entry are only correct if the guess was.
    AssumeFourBytes,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub struct ScanOptions {
    pub unknown_tags: UnknownTagPolicy,
}

/// A class file whose constant pool has been indexed, borrowing the class
/// bytes it was built from.
#[derive(Debug, Clone)]
pub struct ParsedClass<'class> {
    buffer: ClassBuffer<'class>,
    pub constant_pool: ConstantPool<'class>,
    minor_version: u16,
    major_version: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces_count: u16,
    interfaces_start: usize,
}

impl<'class> ParsedClass<'class> {
    pub fn build(data: &'class [u8]) -> ClassFileResult<ParsedClass<'class>> {
        Self::build_with(data, ScanOptions::default())
    }

    pub fn build_with(
        data: &'class [u8],
        options: ScanOptions,
    ) -> ClassFileResult<ParsedClass<'class>> {
        Self::parse(data, options).inspect_err(|err| {
            warn!("rejected class bytes ({} bytes): {err}", data.len());
        })
    }

    fn parse(data: &'class [u8], options: ScanOptions) -> ClassFileResult<ParsedClass<'class>> {
        let buffer = ClassBuffer { data };

        // Checked before the size so that a short foreign buffer still reads as
        // foreign. An empty buffer carries no magic at all.
        let magic = CLASS_MAGIC.to_be_bytes();
        let prefix = &data[..data.len().min(magic.len())];
        if prefix.is_empty() || prefix != &magic[..prefix.len()] {
            return Err(ClassFileError::BadMagic);
        }
        if data.len() <= CLASS_HEADER_SIZE {
            return Err(ClassFileError::TooSmall {
                len: data.len(),
                required: CLASS_HEADER_SIZE + 1,
            });
        }

        let (constant_pool, metadata_start) = ConstantPool::new(buffer, options)?;

        let interfaces_start = metadata_start + CLASS_INFO_SIZE;
        buffer.require(interfaces_start)?;
        let interfaces_count = buffer.read_u16(metadata_start + 6)?;
        buffer.require(interfaces_start + 2 * interfaces_count as usize)?;

        Ok(ParsedClass {
            buffer,
            minor_version: buffer.read_u16(4)?,
            major_version: buffer.read_u16(6)?,
            access_flags: buffer.read_u16(metadata_start)?,
            this_class: buffer.read_u16(metadata_start + 2)?,
            super_class: buffer.read_u16(metadata_start + 4)?,
            interfaces_count,
            interfaces_start,
            constant_pool,
        })
    }

    pub fn bytes(&self) -> &'class [u8] {
        self.buffer.data
    }

    pub fn byte_count(&self) -> usize {
        self.buffer.len()
    }

    pub fn minor_version(&self) -> u16 {
        self.minor_version
    }

    pub fn major_version(&self) -> u16 {
        self.major_version
    }

    /// Size in bytes of the constant pool entries, excluding the fixed class
    /// header in front of them.
    pub fn pool_byte_size(&self) -> usize {
        self.constant_pool.byte_size()
    }

    pub fn access(&self) -> ClassAccess {
        ClassAccess::from_bits_retain(self.access_flags)
    }

    pub fn this_class_index(&self) -> u16 {
        self.this_class
    }

    pub fn super_class_index(&self) -> u16 {
        self.super_class
    }

    pub(crate) fn interfaces_count(&self) -> u16 {
        self.interfaces_count
    }

    /// Constant pool index of the `index`-th direct superinterface.
    pub fn interface_index(&self, index: usize) -> ClassFileResult<u16> {
        if index >= self.interfaces_count as usize {
            return Err(ClassFileError::BadInterfaceIndex {
                index,
                count: self.interfaces_count,
            });
        }
        self.buffer.read_u16(self.interfaces_start + index * 2)
    }
}

/// Bounds-checked big-endian reads over borrowed class bytes.
#[derive(Debug, Copy, Clone)]
pub struct ClassBuffer<'class> {
    data: &'class [u8],
}

impl<'class> ClassBuffer<'class> {
    pub fn new(data: &'class [u8]) -> ClassBuffer<'class> {
        ClassBuffer { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn require(&self, len: usize) -> ClassFileResult<()> {
        if self.data.len() < len {
            return Err(ClassFileError::TooSmall {
                len: self.data.len(),
                required: len,
            });
        }
        Ok(())
    }

    pub(crate) fn read_array<const N: usize>(&self, index: usize) -> ClassFileResult<[u8; N]> {
        let mut array = [0; N];
        array.copy_from_slice(self.read_bytes(index, N)?);
        Ok(array)
    }

    pub fn read_u8(&self, index: usize) -> ClassFileResult<u8> {
        self.read_array::<1>(index).map(|arr| arr[0])
    }

    pub fn read_u16(&self, index: usize) -> ClassFileResult<u16> {
        self.read_array::<2>(index).map(u16::from_be_bytes)
    }

    pub fn read_u32(&self, index: usize) -> ClassFileResult<u32> {
        self.read_array::<4>(index).map(u32::from_be_bytes)
    }

    pub fn read_bytes(&self, index: usize, len: usize) -> ClassFileResult<&'class [u8]> {
        index
            .checked_add(len)
            .and_then(|end| self.data.get(index..end))
            .ok_or(ClassFileError::OutOfBounds {
                index: index.saturating_add(len).saturating_sub(1),
                len: self.data.len(),
            })
    }
}
