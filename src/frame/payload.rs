use super::flags::*;
use super::header::{FrameHeader, HEADER_LEN};
use super::types::*;
use crate::settings::Settings;
use bytes::{Buf, BufMut, Bytes, BytesMut};
use num_traits::{FromPrimitive, ToPrimitive};

/// Whether a decode failure is scoped to the whole connection or to a single
/// stream. The frame codec only has enough information to make this call for
/// a handful of rules (e.g. PRIORITY self-dependency); everything else that
/// depends on connection state (idle-stream RST_STREAM, stream_id ordering)
/// is classified by the connection engine once it has that state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    Connection,
    Stream(u32),
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct DecodeError {
    pub scope: Scope,
    pub code: ErrorCode,
    pub message: &'static str,
}

impl DecodeError {
    fn conn(code: ErrorCode, message: &'static str) -> Self {
        Self {
            scope: Scope::Connection,
            code,
            message,
        }
    }

    fn stream(stream_id: u32, code: ErrorCode, message: &'static str) -> Self {
        Self {
            scope: Scope::Stream(stream_id),
            code,
            message,
        }
    }
}

/// Opaque reason used for every padding-related parse failure, on both DATA
/// and HEADERS. Never distinguish "too long" from "too short" here: a peer
/// probing for a padding oracle must not learn which one happened.
const PADDING_ERROR: &str = "invalid padding";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Priority {
    pub exclusive: bool,
    pub dependency: u32,
    pub weight: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    Data {
        stream_id: u32,
        end_stream: bool,
        data: Bytes,
    },
    Headers {
        stream_id: u32,
        end_stream: bool,
        end_headers: bool,
        priority: Option<Priority>,
        header_block: Bytes,
    },
    Priority {
        stream_id: u32,
        priority: Priority,
    },
    ResetStream {
        stream_id: u32,
        error_code: ErrorCode,
    },
    Settings {
        ack: bool,
        params: Settings,
    },
    PushPromise {
        stream_id: u32,
        promised_stream_id: u32,
        end_headers: bool,
        header_block: Bytes,
    },
    Ping {
        ack: bool,
        opaque_data: [u8; 8],
    },
    GoAway {
        last_stream_id: u32,
        error_code: ErrorCode,
        debug_data: Bytes,
    },
    WindowUpdate {
        stream_id: u32,
        increment: u32,
    },
    Continuation {
        stream_id: u32,
        end_headers: bool,
        header_block: Bytes,
    },
    Unknown {
        frame_type: u8,
        stream_id: u32,
    },
}

impl Frame {
    pub fn stream_id(&self) -> u32 {
        match self {
            Frame::Data { stream_id, .. }
            | Frame::Headers { stream_id, .. }
            | Frame::Priority { stream_id, .. }
            | Frame::ResetStream { stream_id, .. }
            | Frame::PushPromise { stream_id, .. }
            | Frame::WindowUpdate { stream_id, .. }
            | Frame::Continuation { stream_id, .. }
            | Frame::Unknown { stream_id, .. } => *stream_id,
            Frame::Settings { .. } | Frame::Ping { .. } | Frame::GoAway { .. } => 0,
        }
    }

    /// Parses the payload of a single frame given its already-parsed header.
    /// `header.length` MUST already have been checked against the peer's
    /// MAX_FRAME_SIZE by the caller; this only validates per-type structure.
    pub fn decode(header: &FrameHeader, payload: Bytes) -> Result<Self, DecodeError> {
        let Some(ty) = header.frame_type() else {
            return Ok(Frame::Unknown {
                frame_type: header.raw_type,
                stream_id: header.stream_id,
            });
        };

        match ty {
            FrameType::Data => decode_data(header, payload),
            FrameType::Headers => decode_headers(header, payload),
            FrameType::Priority => decode_priority(header, payload),
            FrameType::ResetStream => decode_reset_stream(header, payload),
            FrameType::Settings => decode_settings(header, payload),
            FrameType::PushPromise => decode_push_promise(header, payload),
            FrameType::Ping => decode_ping(header, payload),
            FrameType::GoAway => decode_goaway(header, payload),
            FrameType::WindowUpdate => decode_window_update(header, payload),
            FrameType::Continuation => decode_continuation(header, payload),
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut out = BytesMut::new();
        match self {
            Frame::Data {
                stream_id,
                end_stream,
                data,
            } => {
                let flags = if *end_stream {
                    DataFlags::END_STREAM.bits()
                } else {
                    0
                };
                encode_with_header(&mut out, FrameType::Data, flags, *stream_id, data.len(), |buf| {
                    buf.put_slice(data)
                });
            }
            Frame::Headers {
                stream_id,
                end_stream,
                end_headers,
                priority,
                header_block,
            } => {
                let mut flags = HeadersFlags::empty();
                if *end_stream {
                    flags |= HeadersFlags::END_STREAM;
                }
                if *end_headers {
                    flags |= HeadersFlags::END_HEADERS;
                }
                if priority.is_some() {
                    flags |= HeadersFlags::PRIORITY;
                }
                let priority_len = if priority.is_some() { 5 } else { 0 };
                let len = priority_len + header_block.len();
                encode_with_header(&mut out, FrameType::Headers, flags.bits(), *stream_id, len, |buf| {
                    if let Some(p) = priority {
                        write_priority(buf, p);
                    }
                    buf.put_slice(header_block);
                });
            }
            Frame::Priority {
                stream_id,
                priority,
            } => {
                encode_with_header(&mut out, FrameType::Priority, 0, *stream_id, 5, |buf| {
                    write_priority(buf, priority)
                });
            }
            Frame::ResetStream {
                stream_id,
                error_code,
            } => {
                encode_with_header(&mut out, FrameType::ResetStream, 0, *stream_id, 4, |buf| {
                    buf.put_u32(error_code.to_u32().unwrap_or(ErrorCode::InternalError as u32))
                });
            }
            Frame::Settings { ack, params } => {
                let flags = if *ack { SettingsFlags::ACK.bits() } else { 0 };
                let len = params.len() * 6;
                encode_with_header(&mut out, FrameType::Settings, flags, 0, len, |buf| {
                    for (param, value) in params.iter() {
                        buf.put_u16(param.to_u16().expect("SettingsParameter fits in u16"));
                        buf.put_u32(*value);
                    }
                });
            }
            Frame::PushPromise {
                stream_id,
                promised_stream_id,
                end_headers,
                header_block,
            } => {
                let flags = if *end_headers {
                    PushPromiseFlags::END_HEADERS.bits()
                } else {
                    0
                };
                let len = 4 + header_block.len();
                encode_with_header(&mut out, FrameType::PushPromise, flags, *stream_id, len, |buf| {
                    buf.put_u32(*promised_stream_id & !(1 << 31));
                    buf.put_slice(header_block);
                });
            }
            Frame::Ping { ack, opaque_data } => {
                let flags = if *ack { PingFlags::ACK.bits() } else { 0 };
                encode_with_header(&mut out, FrameType::Ping, flags, 0, 8, |buf| {
                    buf.put_slice(opaque_data)
                });
            }
            Frame::GoAway {
                last_stream_id,
                error_code,
                debug_data,
            } => {
                let len = 8 + debug_data.len();
                encode_with_header(&mut out, FrameType::GoAway, 0, 0, len, |buf| {
                    buf.put_u32(*last_stream_id & !(1 << 31));
                    buf.put_u32(error_code.to_u32().unwrap_or(ErrorCode::InternalError as u32));
                    buf.put_slice(debug_data);
                });
            }
            Frame::WindowUpdate {
                stream_id,
                increment,
            } => {
                encode_with_header(&mut out, FrameType::WindowUpdate, 0, *stream_id, 4, |buf| {
                    // The reserved bit is always cleared on the increment, per §4.1.
                    buf.put_u32(*increment & !(1 << 31))
                });
            }
            Frame::Continuation {
                stream_id,
                end_headers,
                header_block,
            } => {
                let flags = if *end_headers {
                    ContinuationFlags::END_HEADERS.bits()
                } else {
                    0
                };
                encode_with_header(
                    &mut out,
                    FrameType::Continuation,
                    flags,
                    *stream_id,
                    header_block.len(),
                    |buf| buf.put_slice(header_block),
                );
            }
            Frame::Unknown { .. } => {
                // Never encoded; we only receive and ignore unknown types.
            }
        }
        out.freeze()
    }
}

fn encode_with_header(
    out: &mut BytesMut,
    ty: FrameType,
    flags: u8,
    stream_id: u32,
    payload_len: usize,
    write_payload: impl FnOnce(&mut BytesMut),
) {
    let header = FrameHeader::new(payload_len as u32, ty, flags, stream_id);
    let mut head_buf = Vec::with_capacity(HEADER_LEN);
    header.write(&mut head_buf);
    out.put_slice(&head_buf);
    write_payload(out);
}

fn write_priority(buf: &mut BytesMut, p: &Priority) {
    let dep = p.dependency & !(1 << 31);
    let dep = if p.exclusive { dep | (1 << 31) } else { dep };
    buf.put_u32(dep);
    buf.put_u8(p.weight);
}

fn read_priority(buf: &mut Bytes) -> Priority {
    let raw = buf.get_u32();
    let exclusive = raw & (1 << 31) != 0;
    let dependency = raw & !(1 << 31);
    let weight = buf.get_u8();
    Priority {
        exclusive,
        dependency,
        weight,
    }
}

/// Strips and validates PADDED-flag padding from `payload`, returning the
/// unpadded body. Any malformation surfaces the single opaque
/// [`PADDING_ERROR`] string to avoid a padding oracle.
fn strip_padding(payload: &mut Bytes) -> Result<(), DecodeError> {
    if payload.is_empty() {
        return Err(DecodeError::conn(ErrorCode::ProtocolError, PADDING_ERROR));
    }
    let pad_len = payload[0] as usize;
    payload.advance(1);
    if pad_len >= payload.len() {
        return Err(DecodeError::conn(ErrorCode::ProtocolError, PADDING_ERROR));
    }
    payload.truncate(payload.len() - pad_len);
    Ok(())
}

fn decode_data(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id == 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "DATA on stream 0",
        ));
    }
    let flags = header.flags;
    if flags & DataFlags::PADDED.bits() != 0 {
        strip_padding(&mut payload)?;
    }
    Ok(Frame::Data {
        stream_id: header.stream_id,
        end_stream: flags & DataFlags::END_STREAM.bits() != 0,
        data: payload,
    })
}

fn decode_headers(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id == 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "HEADERS on stream 0",
        ));
    }
    let flags = header.flags;
    if flags & HeadersFlags::PADDED.bits() != 0 {
        strip_padding(&mut payload)?;
    }
    let priority = if flags & HeadersFlags::PRIORITY.bits() != 0 {
        if payload.len() < 5 {
            return Err(DecodeError::conn(
                ErrorCode::FrameSizeError,
                "HEADERS priority block truncated",
            ));
        }
        let p = read_priority(&mut payload);
        if p.dependency == header.stream_id {
            return Err(DecodeError::stream(
                header.stream_id,
                ErrorCode::ProtocolError,
                "HEADERS self-dependency",
            ));
        }
        Some(p)
    } else {
        None
    };
    Ok(Frame::Headers {
        stream_id: header.stream_id,
        end_stream: flags & HeadersFlags::END_STREAM.bits() != 0,
        end_headers: flags & HeadersFlags::END_HEADERS.bits() != 0,
        priority,
        header_block: payload,
    })
}

fn decode_priority(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id == 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "PRIORITY on stream 0",
        ));
    }
    if payload.len() != 5 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "PRIORITY payload must be 5 bytes",
        ));
    }
    let priority = read_priority(&mut payload);
    if priority.dependency == header.stream_id {
        return Err(DecodeError::stream(
            header.stream_id,
            ErrorCode::ProtocolError,
            "PRIORITY self-dependency",
        ));
    }
    Ok(Frame::Priority {
        stream_id: header.stream_id,
        priority,
    })
}

fn decode_reset_stream(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id == 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "RST_STREAM on stream 0",
        ));
    }
    if payload.len() != 4 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "RST_STREAM payload must be 4 bytes",
        ));
    }
    let raw = payload.get_u32();
    let error_code = ErrorCode::from_u32(raw).unwrap_or(ErrorCode::InternalError);
    Ok(Frame::ResetStream {
        stream_id: header.stream_id,
        error_code,
    })
}

fn decode_settings(header: &FrameHeader, payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id != 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "SETTINGS on non-zero stream",
        ));
    }
    if payload.len() % 6 != 0 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "SETTINGS payload not a multiple of 6",
        ));
    }
    let ack = header.flags & SettingsFlags::ACK.bits() != 0;
    if ack && !payload.is_empty() {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "SETTINGS ACK must be empty",
        ));
    }
    let mut params = Settings::new();
    for chunk in payload.chunks(6) {
        let id = u16::from_be_bytes([chunk[0], chunk[1]]);
        let value = u32::from_be_bytes([chunk[2], chunk[3], chunk[4], chunk[5]]);
        let Some(param) = SettingsParameter::from_u16(id) else {
            // unknown settings identifiers are ignored on receipt
            continue;
        };
        validate_settings_value(param, value)?;
        params.set(param, value);
    }
    Ok(Frame::Settings { ack, params })
}

fn validate_settings_value(param: SettingsParameter, value: u32) -> Result<(), DecodeError> {
    match param {
        SettingsParameter::EnablePush if value > 1 => Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "ENABLE_PUSH must be 0 or 1",
        )),
        SettingsParameter::InitialWindowSize if value as i64 > MAX_WINDOW_SIZE => Err(
            DecodeError::conn(ErrorCode::FlowControlError, "INITIAL_WINDOW_SIZE too large"),
        ),
        SettingsParameter::MaxFrameSize
            if !(DEFAULT_MAX_FRAME_SIZE..=MAX_FRAME_SIZE_UPPER_BOUND).contains(&value) =>
        {
            Err(DecodeError::conn(
                ErrorCode::ProtocolError,
                "MAX_FRAME_SIZE out of range",
            ))
        }
        _ => Ok(()),
    }
}

fn decode_push_promise(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id == 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "PUSH_PROMISE on stream 0",
        ));
    }
    let flags = header.flags;
    if flags & PushPromiseFlags::PADDED.bits() != 0 {
        strip_padding(&mut payload)?;
    }
    if payload.len() < 4 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "PUSH_PROMISE truncated",
        ));
    }
    let promised_stream_id = payload.get_u32() & !(1 << 31);
    Ok(Frame::PushPromise {
        stream_id: header.stream_id,
        promised_stream_id,
        end_headers: flags & PushPromiseFlags::END_HEADERS.bits() != 0,
        header_block: payload,
    })
}

fn decode_ping(header: &FrameHeader, payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id != 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "PING on non-zero stream",
        ));
    }
    if payload.len() != 8 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "PING payload must be 8 bytes",
        ));
    }
    let mut opaque_data = [0u8; 8];
    opaque_data.copy_from_slice(&payload);
    Ok(Frame::Ping {
        ack: header.flags & PingFlags::ACK.bits() != 0,
        opaque_data,
    })
}

fn decode_goaway(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id != 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "GOAWAY on non-zero stream",
        ));
    }
    if payload.len() < 8 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "GOAWAY truncated",
        ));
    }
    let last_stream_id = payload.get_u32() & !(1 << 31);
    let raw = payload.get_u32();
    let error_code = ErrorCode::from_u32(raw).unwrap_or(ErrorCode::InternalError);
    Ok(Frame::GoAway {
        last_stream_id,
        error_code,
        debug_data: payload,
    })
}

fn decode_window_update(header: &FrameHeader, mut payload: Bytes) -> Result<Frame, DecodeError> {
    if payload.len() != 4 {
        return Err(DecodeError::conn(
            ErrorCode::FrameSizeError,
            "WINDOW_UPDATE payload must be 4 bytes",
        ));
    }
    let increment = payload.get_u32() & !(1 << 31);
    if increment == 0 {
        let scope = if header.stream_id == 0 {
            Scope::Connection
        } else {
            Scope::Stream(header.stream_id)
        };
        return Err(DecodeError {
            scope,
            code: ErrorCode::ProtocolError,
            message: "zero WINDOW_UPDATE increment",
        });
    }
    Ok(Frame::WindowUpdate {
        stream_id: header.stream_id,
        increment,
    })
}

fn decode_continuation(header: &FrameHeader, payload: Bytes) -> Result<Frame, DecodeError> {
    if header.stream_id == 0 {
        return Err(DecodeError::conn(
            ErrorCode::ProtocolError,
            "CONTINUATION on stream 0",
        ));
    }
    Ok(Frame::Continuation {
        stream_id: header.stream_id,
        end_headers: header.flags & ContinuationFlags::END_HEADERS.bits() != 0,
        header_block: payload,
    })
}
