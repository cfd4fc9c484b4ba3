use bitflags::bitflags;

bitflags! {
    /// <https://httpwg.org/specs/rfc9113.html#DATA>
    #[repr(transparent)]
    pub struct DataFlags: u8 {
        const END_STREAM = 0x1;
        const PADDED = 0x8;
    }

    /// <https://httpwg.org/specs/rfc9113.html#HEADERS>
    #[repr(transparent)]
    pub struct HeadersFlags: u8 {
        const END_STREAM = 0x1;
        const END_HEADERS = 0x4;
        const PADDED = 0x8;
        const PRIORITY = 0x20;
    }

    /// <https://httpwg.org/specs/rfc9113.html#PRIORITY>
    #[repr(transparent)]
    pub struct PriorityFlags: u8 {
        const NONE = 0x0;
    }

    /// <https://httpwg.org/specs/rfc9113.html#RST_STREAM>
    #[repr(transparent)]
    pub struct ResetStreamFlags: u8 {
        const NONE = 0x0;
    }

    /// <https://httpwg.org/specs/rfc9113.html#SETTINGS>
    #[repr(transparent)]
    pub struct SettingsFlags: u8 {
        const ACK = 0x1;
    }

    /// <https://httpwg.org/specs/rfc9113.html#PUSH_PROMISE>
    #[repr(transparent)]
    pub struct PushPromiseFlags: u8 {
        const END_HEADERS = 0x4;
        const PADDED = 0x8;
    }

    /// <https://httpwg.org/specs/rfc9113.html#PING>
    #[repr(transparent)]
    pub struct PingFlags: u8 {
        const ACK = 0x1;
    }

    /// <https://httpwg.org/specs/rfc9113.html#GOAWAY>
    #[repr(transparent)]
    pub struct GoAwayFlags: u8 {
        const NONE = 0x0;
    }

    /// <https://httpwg.org/specs/rfc9113.html#WINDOW_UPDATE>
    #[repr(transparent)]
    pub struct WindowUpdateFlags: u8 {
        const NONE = 0x0;
    }

    /// <https://httpwg.org/specs/rfc9113.html#CONTINUATION>
    #[repr(transparent)]
    pub struct ContinuationFlags: u8 {
        const END_HEADERS = 0x4;
    }
}
