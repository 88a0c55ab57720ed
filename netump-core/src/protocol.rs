//! NetUMP wire protocol types, constants, and utilities.
//!
//! A NetUMP datagram is a 4-byte `"MIDI"` signature followed by one or more
//! command packets. Each command packet is a 4-byte header (opcode, payload
//! length in 32-bit words, two command-specific bytes) plus its payload. Only
//! the first packet in a datagram carries the signature; the rest follow
//! back-to-back. All multi-byte fields are big-endian.

use bytes::{Buf, BufMut, Bytes, BytesMut};

/// ASCII `"MIDI"`, first word of every datagram.
pub const SIGNATURE: u32 = 0x4D49_4449;

/// Maximum number of UMP payload words in one UMP-data command packet.
pub const MAX_DATA_WORDS: usize = 64;

/// Maximum size of one UMP-data command packet in words (header included).
pub const MAX_PACKET_WORDS: usize = MAX_DATA_WORDS + 1;

/// Practical ceiling for an assembled datagram (signature + FEC tail).
pub const MAX_DATAGRAM_BYTES: usize = 1024;

/// Maximum endpoint name length in bytes, NUL terminator included.
pub const MAX_ENDPOINT_NAME_BYTES: usize = 98;

/// Maximum product instance id length in bytes, NUL terminator included.
pub const MAX_PRODUCT_INSTANCE_ID_BYTES: usize = 42;

/// NetUMP command opcodes
pub mod opcodes {
    pub const INVITATION: u8 = 0x01;
    pub const INVITATION_AUTHENTICATE: u8 = 0x02;
    pub const INVITATION_USER_AUTHENTICATE: u8 = 0x03;
    pub const INVITATION_ACCEPTED: u8 = 0x10;
    pub const INVITATION_PENDING: u8 = 0x11;
    pub const INVITATION_AUTH_REQUIRED: u8 = 0x12;
    pub const INVITATION_USER_AUTH_REQUIRED: u8 = 0x13;
    pub const PING: u8 = 0x20;
    pub const PING_REPLY: u8 = 0x21;
    pub const RETRANSMIT: u8 = 0x80;
    pub const RETRANSMIT_ERROR: u8 = 0x81;
    pub const SESSION_RESET: u8 = 0x82;
    pub const SESSION_RESET_REPLY: u8 = 0x83;
    pub const NAK: u8 = 0x8F;
    pub const BYE: u8 = 0xF0;
    pub const BYE_REPLY: u8 = 0xF1;
    pub const UMP_DATA: u8 = 0xFF;
}

/// Size of UMP messages in 32-bit words for each possible Message Type.
pub const UMP_WORD_COUNTS: [usize; 16] = [1, 1, 1, 2, 2, 4, 1, 1, 2, 2, 2, 3, 3, 4, 4, 4];

/// Number of 32-bit words in the UMP message starting with `first_word`,
/// derived from the MT field (high nibble).
#[inline]
pub fn ump_message_words(first_word: u32) -> usize {
    UMP_WORD_COUNTS[(first_word >> 28) as usize]
}

/// Reason code carried by a BYE command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ByeReason {
    Undefined,
    UserTerminated,
    PowerDown,
    TooManyLostPackets,
    Timeout,
    SessionNotEstablished,
    NoPendingSession,
    ProtocolError,
    TooManySessions,
    InvitationAuthRejected,
    UserDidNotAcceptSession,
    AuthenticationFailed,
    UsernameNotFound,
    NoMatchingAuthMethod,
    InvitationCanceled,
}

impl ByeReason {
    /// Wire code for this reason.
    pub fn code(self) -> u8 {
        match self {
            ByeReason::Undefined => 0x00,
            ByeReason::UserTerminated => 0x01,
            ByeReason::PowerDown => 0x02,
            ByeReason::TooManyLostPackets => 0x03,
            ByeReason::Timeout => 0x04,
            ByeReason::SessionNotEstablished => 0x05,
            ByeReason::NoPendingSession => 0x06,
            ByeReason::ProtocolError => 0x07,
            ByeReason::TooManySessions => 0x40,
            ByeReason::InvitationAuthRejected => 0x41,
            ByeReason::UserDidNotAcceptSession => 0x42,
            ByeReason::AuthenticationFailed => 0x43,
            ByeReason::UsernameNotFound => 0x44,
            ByeReason::NoMatchingAuthMethod => 0x45,
            ByeReason::InvitationCanceled => 0x80,
        }
    }

    /// Decode a wire code. Unknown codes map to [`ByeReason::Undefined`].
    pub fn from_code(code: u8) -> Self {
        match code {
            0x01 => ByeReason::UserTerminated,
            0x02 => ByeReason::PowerDown,
            0x03 => ByeReason::TooManyLostPackets,
            0x04 => ByeReason::Timeout,
            0x05 => ByeReason::SessionNotEstablished,
            0x06 => ByeReason::NoPendingSession,
            0x07 => ByeReason::ProtocolError,
            0x40 => ByeReason::TooManySessions,
            0x41 => ByeReason::InvitationAuthRejected,
            0x42 => ByeReason::UserDidNotAcceptSession,
            0x43 => ByeReason::AuthenticationFailed,
            0x44 => ByeReason::UsernameNotFound,
            0x45 => ByeReason::NoMatchingAuthMethod,
            0x80 => ByeReason::InvitationCanceled,
            _ => ByeReason::Undefined,
        }
    }
}

/// One NetUMP command packet, decoded.
///
/// [`Command::Unsupported`] is produced for well-framed commands this
/// endpoint does not handle (authentication flows, retransmit requests,
/// NAK). It is decode-only and never emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Invitation {
        capabilities: u8,
        endpoint_name: String,
        product_instance_id: String,
    },
    InvitationAccepted {
        endpoint_name: String,
        product_instance_id: String,
    },
    Ping {
        id: u32,
    },
    PingReply {
        id: u32,
    },
    SessionReset,
    SessionResetReply,
    Bye {
        reason: ByeReason,
    },
    ByeReply,
    UmpData {
        sequence: u16,
        words: Vec<u32>,
    },
    Unsupported {
        opcode: u8,
    },
}

/// Number of 32-bit words occupied by `s` plus its NUL terminator,
/// rounded up to a word boundary.
fn padded_word_len(s: &str) -> usize {
    (s.len() + 1).div_ceil(4)
}

/// Append `s`, a NUL terminator, and zero padding up to a word boundary.
fn put_padded_str(buf: &mut BytesMut, s: &str) {
    buf.put_slice(s.as_bytes());
    buf.put_bytes(0, padded_word_len(s) * 4 - s.len());
}

/// Read a NUL-terminated UTF-8 string from the front of `data`.
fn read_cstr(data: &[u8]) -> Option<&str> {
    let end = data.iter().position(|&b| b == 0)?;
    std::str::from_utf8(&data[..end]).ok()
}

impl Command {
    /// Wire opcode of this command.
    pub fn opcode(&self) -> u8 {
        match self {
            Command::Invitation { .. } => opcodes::INVITATION,
            Command::InvitationAccepted { .. } => opcodes::INVITATION_ACCEPTED,
            Command::Ping { .. } => opcodes::PING,
            Command::PingReply { .. } => opcodes::PING_REPLY,
            Command::SessionReset => opcodes::SESSION_RESET,
            Command::SessionResetReply => opcodes::SESSION_RESET_REPLY,
            Command::Bye { .. } => opcodes::BYE,
            Command::ByeReply => opcodes::BYE_REPLY,
            Command::UmpData { .. } => opcodes::UMP_DATA,
            Command::Unsupported { opcode } => *opcode,
        }
    }

    /// Command name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Command::Invitation { .. } => "INVITATION",
            Command::InvitationAccepted { .. } => "INVITATION_ACCEPTED",
            Command::Ping { .. } => "PING",
            Command::PingReply { .. } => "PING_REPLY",
            Command::SessionReset => "SESSION_RESET",
            Command::SessionResetReply => "SESSION_RESET_REPLY",
            Command::Bye { .. } => "BYE",
            Command::ByeReply => "BYE_REPLY",
            Command::UmpData { .. } => "UMP_DATA",
            Command::Unsupported { .. } => "UNSUPPORTED",
        }
    }

    /// Encode this command packet (header + payload, no signature) into `buf`.
    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Command::Invitation {
                capabilities,
                endpoint_name,
                product_instance_id,
            } => {
                let name_words = padded_word_len(endpoint_name);
                let piid_words = padded_word_len(product_instance_id);
                buf.put_u8(opcodes::INVITATION);
                buf.put_u8((name_words + piid_words) as u8);
                buf.put_u8(name_words as u8);
                buf.put_u8(*capabilities);
                put_padded_str(buf, endpoint_name);
                put_padded_str(buf, product_instance_id);
            }
            Command::InvitationAccepted {
                endpoint_name,
                product_instance_id,
            } => {
                let name_words = padded_word_len(endpoint_name);
                let piid_words = padded_word_len(product_instance_id);
                buf.put_u8(opcodes::INVITATION_ACCEPTED);
                buf.put_u8((name_words + piid_words) as u8);
                buf.put_u8(name_words as u8);
                buf.put_u8(0);
                put_padded_str(buf, endpoint_name);
                put_padded_str(buf, product_instance_id);
            }
            Command::Ping { id } => {
                buf.put_u8(opcodes::PING);
                buf.put_u8(1);
                buf.put_u16(0);
                buf.put_u32(*id);
            }
            Command::PingReply { id } => {
                buf.put_u8(opcodes::PING_REPLY);
                buf.put_u8(1);
                buf.put_u16(0);
                buf.put_u32(*id);
            }
            Command::SessionReset => {
                buf.put_u8(opcodes::SESSION_RESET);
                buf.put_u8(0);
                buf.put_u16(0);
            }
            Command::SessionResetReply => {
                buf.put_u8(opcodes::SESSION_RESET_REPLY);
                buf.put_u8(0);
                buf.put_u16(0);
            }
            Command::Bye { reason } => {
                buf.put_u8(opcodes::BYE);
                buf.put_u8(0);
                buf.put_u8(reason.code());
                buf.put_u8(0);
            }
            Command::ByeReply => {
                buf.put_u8(opcodes::BYE_REPLY);
                buf.put_u8(0);
                buf.put_u16(0);
            }
            Command::UmpData { sequence, words } => {
                buf.put_u8(opcodes::UMP_DATA);
                buf.put_u8(words.len() as u8);
                buf.put_u16(*sequence);
                for &word in words {
                    buf.put_u32(word);
                }
            }
            // Decode-only variant, nothing to emit.
            Command::Unsupported { .. } => {}
        }
    }

    /// Decode one command packet from the front of `buf`, consuming it.
    ///
    /// Returns `None` when the packet is truncated or its strings are
    /// malformed; the caller drops the remainder of the datagram.
    pub fn decode(buf: &mut Bytes) -> Option<Command> {
        if buf.len() < 4 {
            return None;
        }
        let opcode = buf[0];
        let payload_words = buf[1] as usize;
        let csd1 = buf[2];
        let csd2 = buf[3];
        if buf.len() < 4 + payload_words * 4 {
            return None;
        }
        buf.advance(4);
        let payload = buf.split_to(payload_words * 4);

        match opcode {
            opcodes::INVITATION | opcodes::INVITATION_ACCEPTED => {
                let name_bytes = csd1 as usize * 4;
                if name_bytes > payload.len() {
                    return None;
                }
                let endpoint_name = read_cstr(&payload[..name_bytes])?.to_owned();
                let product_instance_id = read_cstr(&payload[name_bytes..])?.to_owned();
                if opcode == opcodes::INVITATION {
                    Some(Command::Invitation {
                        capabilities: csd2,
                        endpoint_name,
                        product_instance_id,
                    })
                } else {
                    Some(Command::InvitationAccepted {
                        endpoint_name,
                        product_instance_id,
                    })
                }
            }
            opcodes::PING | opcodes::PING_REPLY => {
                if payload.len() < 4 {
                    return None;
                }
                let id = u32::from_be_bytes([payload[0], payload[1], payload[2], payload[3]]);
                if opcode == opcodes::PING {
                    Some(Command::Ping { id })
                } else {
                    Some(Command::PingReply { id })
                }
            }
            opcodes::SESSION_RESET => Some(Command::SessionReset),
            opcodes::SESSION_RESET_REPLY => Some(Command::SessionResetReply),
            opcodes::BYE => Some(Command::Bye {
                reason: ByeReason::from_code(csd1),
            }),
            opcodes::BYE_REPLY => Some(Command::ByeReply),
            opcodes::UMP_DATA => {
                let sequence = u16::from_be_bytes([csd1, csd2]);
                let words = payload
                    .chunks_exact(4)
                    .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
                    .collect();
                Some(Command::UmpData { sequence, words })
            }
            _ => Some(Command::Unsupported { opcode }),
        }
    }
}

/// Check the datagram signature and return the command packets behind it.
pub fn strip_signature(datagram: &[u8]) -> Option<&[u8]> {
    if datagram.len() >= 4 && datagram[..4] == SIGNATURE.to_be_bytes() {
        Some(&datagram[4..])
    } else {
        None
    }
}

/// Build a single-command datagram: signature followed by `command`.
pub fn command_datagram(command: &Command) -> Bytes {
    let mut buf = BytesMut::with_capacity(MAX_DATAGRAM_BYTES / 4);
    buf.put_u32(SIGNATURE);
    command.encode(&mut buf);
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(command: Command) {
        let mut buf = BytesMut::new();
        command.encode(&mut buf);
        let mut bytes = buf.freeze();
        let decoded = Command::decode(&mut bytes).expect("decode");
        assert_eq!(decoded, command);
        assert!(bytes.is_empty(), "decode must consume the whole packet");
    }

    #[test]
    fn roundtrip_all_commands() {
        roundtrip(Command::Invitation {
            capabilities: 0,
            endpoint_name: "Studio A".into(),
            product_instance_id: "unit-42".into(),
        });
        roundtrip(Command::InvitationAccepted {
            endpoint_name: "Studio B".into(),
            product_instance_id: "unit-7".into(),
        });
        roundtrip(Command::Ping { id: 0xDEAD_BEEF });
        roundtrip(Command::PingReply { id: 1 });
        roundtrip(Command::SessionReset);
        roundtrip(Command::SessionResetReply);
        roundtrip(Command::Bye {
            reason: ByeReason::Timeout,
        });
        roundtrip(Command::ByeReply);
        roundtrip(Command::UmpData {
            sequence: 0xFFFE,
            words: vec![0x2091_4040, 0x4090_4000, 0xFFFF_0000],
        });
    }

    #[test]
    fn invitation_layout_is_word_padded() {
        let cmd = Command::Invitation {
            capabilities: 0,
            endpoint_name: "abc".into(), // 3 + NUL = exactly 1 word
            product_instance_id: "abcd".into(), // 4 + NUL = 2 words
        };
        let mut buf = BytesMut::new();
        cmd.encode(&mut buf);
        assert_eq!(buf[0], opcodes::INVITATION);
        assert_eq!(buf[1], 3, "payload = name words + piid words");
        assert_eq!(buf[2], 1, "csd1 = name word count");
        assert_eq!(buf[3], 0, "no auth capabilities");
        assert_eq!(&buf[4..8], b"abc\0");
        assert_eq!(&buf[8..16], b"abcd\0\0\0\0");
    }

    #[test]
    fn ump_data_header_layout() {
        let cmd = Command::UmpData {
            sequence: 0x1234,
            words: vec![0x2091_4040],
        };
        let mut buf = BytesMut::new();
        cmd.encode(&mut buf);
        assert_eq!(&buf[..], &[0xFF, 0x01, 0x12, 0x34, 0x20, 0x91, 0x40, 0x40]);
    }

    #[test]
    fn decode_rejects_truncation() {
        let mut buf = BytesMut::new();
        Command::Ping { id: 9 }.encode(&mut buf);
        let mut short = buf.freeze().slice(..6);
        assert_eq!(Command::decode(&mut short), None);
    }

    #[test]
    fn decode_skips_unsupported_opcode() {
        // A well-framed NAK: 4-byte header + 1 payload word.
        let mut buf = BytesMut::new();
        buf.put_u8(opcodes::NAK);
        buf.put_u8(1);
        buf.put_u16(0);
        buf.put_u32(0);
        let mut bytes = buf.freeze();
        assert_eq!(
            Command::decode(&mut bytes),
            Some(Command::Unsupported {
                opcode: opcodes::NAK
            })
        );
        assert!(bytes.is_empty(), "payload must be consumed so parsing continues");
    }

    #[test]
    fn signature_check() {
        assert!(strip_signature(b"MIDI\xFF\x00\x00\x00").is_some());
        assert!(strip_signature(b"MIDX\xFF\x00\x00\x00").is_none());
        assert!(strip_signature(b"MID").is_none());
    }

    #[test]
    fn bye_reason_codes() {
        for reason in [
            ByeReason::UserTerminated,
            ByeReason::Timeout,
            ByeReason::TooManySessions,
            ByeReason::InvitationCanceled,
        ] {
            assert_eq!(ByeReason::from_code(reason.code()), reason);
        }
        assert_eq!(ByeReason::from_code(0x7E), ByeReason::Undefined);
    }

    #[test]
    fn ump_word_counts_by_message_type() {
        assert_eq!(ump_message_words(0x2091_4040), 1); // MT=2 channel voice
        assert_eq!(ump_message_words(0x4090_4000), 2); // MT=4 MIDI 2.0 voice
        assert_eq!(ump_message_words(0xF000_0000), 4); // MT=F
        assert_eq!(ump_message_words(0x3016_0000), 2); // MT=3 SYSEX7
    }
}
