//! Message kinds for every request and reply the wire protocol carries.

/// Frame message kind byte. Not an exhaustive enum on the wire — unknown
/// kinds are a `Protocol` error at the reader, never silently ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageKind(pub u8);

impl MessageKind {
    pub const REGISTER: Self = Self(0x01);
    pub const HEARTBEAT: Self = Self(0x02);

    pub const PUT_CHUNK: Self = Self(0x10);
    pub const GET_CHUNK: Self = Self(0x11);
    pub const PING: Self = Self(0x12);
    pub const DELETE_CHUNK: Self = Self(0x13);

    pub const UPLOAD_BEGIN: Self = Self(0x20);
    pub const UPLOAD_CHUNK: Self = Self(0x21);
    pub const UPLOAD_COMMIT: Self = Self(0x22);

    pub const DOWNLOAD: Self = Self(0x30);
    pub const DELETE_FILE: Self = Self(0x31);
    pub const LIST_FILES: Self = Self(0x32);

    pub const STATUS: Self = Self(0x40);
    pub const TRIGGER_REREPLICATION: Self = Self(0x41);

    pub const OK: Self = Self(0x81);
    pub const ERR: Self = Self(0x82);
    pub const CHUNK_REPLY: Self = Self(0x83);
    pub const VALUE_REPLY: Self = Self(0x84);
}

impl std::fmt::Display for MessageKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}
