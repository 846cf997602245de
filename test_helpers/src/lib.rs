//! Hand-assembled class files for tests.
//!
//! The builder only knows enough of the format to lay out a constant pool and
//! the fixed header that follows it; no fields, methods or attributes are
//! ever emitted.

pub const TAG_UTF8: u8 = 1;
pub const TAG_INTEGER: u8 = 3;
pub const TAG_FLOAT: u8 = 4;
pub const TAG_LONG: u8 = 5;
pub const TAG_DOUBLE: u8 = 6;
pub const TAG_CLASS: u8 = 7;
pub const TAG_STRING: u8 = 8;
pub const TAG_FIELD_REF: u8 = 9;
pub const TAG_METHOD_REF: u8 = 10;
pub const TAG_NAME_AND_TYPE: u8 = 12;
pub const TAG_METHOD_HANDLE: u8 = 15;
pub const TAG_METHOD_TYPE: u8 = 16;
pub const TAG_MODULE: u8 = 19;
pub const TAG_PACKAGE: u8 = 20;

pub const ACC_PUBLIC: u16 = 0x0001;
pub const ACC_SUPER: u16 = 0x0020;
pub const ACC_INTERFACE: u16 = 0x0200;
pub const ACC_ABSTRACT: u16 = 0x0400;

#[derive(Debug, Clone)]
pub struct ClassFileBuilder {
    magic: u32,
    minor_version: u16,
    major_version: u16,
    pool: Vec<u8>,
    next_index: u16,
    access_flags: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
}

impl Default for ClassFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ClassFileBuilder {
    pub fn new() -> Self {
        Self {
            magic: 0xcafebabe,
            minor_version: 0,
            major_version: 65,
            pool: Vec::new(),
            next_index: 1,
            access_flags: ACC_PUBLIC | ACC_SUPER,
            this_class: 0,
            super_class: 0,
            interfaces: Vec::new(),
        }
    }

    pub fn magic(mut self, magic: u32) -> Self {
        self.magic = magic;
        self
    }

    pub fn version(mut self, major: u16, minor: u16) -> Self {
        self.major_version = major;
        self.minor_version = minor;
        self
    }

    pub fn access(mut self, access_flags: u16) -> Self {
        self.access_flags = access_flags;
        self
    }

    pub fn this_class(mut self, index: u16) -> Self {
        self.this_class = index;
        self
    }

    pub fn super_class(mut self, index: u16) -> Self {
        self.super_class = index;
        self
    }

    pub fn interface(mut self, index: u16) -> Self {
        self.interfaces.push(index);
        self
    }

    /// Appends a raw entry occupying `slots` logical indices and returns the
    /// index of its first slot.
    pub fn raw_entry(&mut self, tag: u8, payload: &[u8], slots: u16) -> u16 {
        let index = self.next_index;
        self.pool.push(tag);
        self.pool.extend_from_slice(payload);
        self.next_index += slots;
        index
    }

    pub fn utf8(&mut self, value: &str) -> u16 {
        let mut payload = (value.len() as u16).to_be_bytes().to_vec();
        payload.extend_from_slice(value.as_bytes());
        self.raw_entry(TAG_UTF8, &payload, 1)
    }

    pub fn class(&mut self, name_index: u16) -> u16 {
        self.raw_entry(TAG_CLASS, &name_index.to_be_bytes(), 1)
    }

    /// Adds a Utf8 entry followed by a Class entry pointing at it.
    pub fn class_named(&mut self, name: &str) -> u16 {
        let name_index = self.utf8(name);
        self.class(name_index)
    }

    pub fn string(&mut self, utf8_index: u16) -> u16 {
        self.raw_entry(TAG_STRING, &utf8_index.to_be_bytes(), 1)
    }

    pub fn method_type(&mut self, descriptor_index: u16) -> u16 {
        self.raw_entry(TAG_METHOD_TYPE, &descriptor_index.to_be_bytes(), 1)
    }

    pub fn method_handle(&mut self, kind: u8, reference_index: u16) -> u16 {
        let [hi, lo] = reference_index.to_be_bytes();
        self.raw_entry(TAG_METHOD_HANDLE, &[kind, hi, lo], 1)
    }

    pub fn integer(&mut self, value: i32) -> u16 {
        self.raw_entry(TAG_INTEGER, &value.to_be_bytes(), 1)
    }

    pub fn float(&mut self, value: f32) -> u16 {
        self.raw_entry(TAG_FLOAT, &value.to_bits().to_be_bytes(), 1)
    }

    pub fn field_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        let mut payload = class_index.to_be_bytes().to_vec();
        payload.extend_from_slice(&name_and_type_index.to_be_bytes());
        self.raw_entry(TAG_FIELD_REF, &payload, 1)
    }

    pub fn name_and_type(&mut self, name_index: u16, descriptor_index: u16) -> u16 {
        let mut payload = name_index.to_be_bytes().to_vec();
        payload.extend_from_slice(&descriptor_index.to_be_bytes());
        self.raw_entry(TAG_NAME_AND_TYPE, &payload, 1)
    }

    pub fn method_ref(&mut self, class_index: u16, name_and_type_index: u16) -> u16 {
        let mut payload = class_index.to_be_bytes().to_vec();
        payload.extend_from_slice(&name_and_type_index.to_be_bytes());
        self.raw_entry(TAG_METHOD_REF, &payload, 1)
    }

    pub fn module(&mut self, name_index: u16) -> u16 {
        self.raw_entry(TAG_MODULE, &name_index.to_be_bytes(), 1)
    }

    pub fn package(&mut self, name_index: u16) -> u16 {
        self.raw_entry(TAG_PACKAGE, &name_index.to_be_bytes(), 1)
    }

    pub fn long(&mut self, high: u32, low: u32) -> u16 {
        let mut payload = high.to_be_bytes().to_vec();
        payload.extend_from_slice(&low.to_be_bytes());
        self.raw_entry(TAG_LONG, &payload, 2)
    }

    pub fn double(&mut self, value: f64) -> u16 {
        self.raw_entry(TAG_DOUBLE, &value.to_bits().to_be_bytes(), 2)
    }

    /// The `constant_pool_count` value the finished class will declare.
    pub fn constant_pool_count(&self) -> u16 {
        self.next_index
    }

    pub fn build(&self) -> Vec<u8> {
        let mut out = Vec::new();
        u4(&mut out, self.magic);
        u2(&mut out, self.minor_version);
        u2(&mut out, self.major_version);
        u2(&mut out, self.next_index);
        out.extend_from_slice(&self.pool);
        u2(&mut out, self.access_flags);
        u2(&mut out, self.this_class);
        u2(&mut out, self.super_class);
        u2(&mut out, self.interfaces.len() as u16);
        for &interface in &self.interfaces {
            u2(&mut out, interface);
        }
        // fields, methods, attributes
        u2(&mut out, 0);
        u2(&mut out, 0);
        u2(&mut out, 0);
        out
    }
}

fn u2(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_be_bytes());
}

fn u4(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_be_bytes());
}

/// `com/example/Foo extends java/lang/Object implements java/lang/Runnable,
/// java/io/Serializable`, with a few unrelated constants mixed in.
pub fn foo_class() -> Vec<u8> {
    let mut builder = ClassFileBuilder::new();
    let this_class = builder.class_named("com/example/Foo");
    let hello = builder.utf8("hello");
    builder.string(hello);
    builder.long(0, 42);
    let super_class = builder.class_named("java/lang/Object");
    builder.double(1.5);
    let runnable = builder.class_named("java/lang/Runnable");
    let serializable = builder.class_named("java/io/Serializable");
    builder
        .this_class(this_class)
        .super_class(super_class)
        .interface(runnable)
        .interface(serializable)
        .build()
}
