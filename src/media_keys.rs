//! Decodes raw hardware media-key payloads into playback commands.
//!
//! The shell's media-key tap forwards the raw event word untouched: the key
//! code sits in bits 16..32, the transition flags in the low 16 bits, and
//! the high byte of the flags is `0x0A` on the pressed edge.

// macOS NX key types as delivered by the media-key tap.
const NX_KEYTYPE_PLAY: i64 = 16;
const NX_KEYTYPE_FAST: i64 = 19;
const NX_KEYTYPE_REWIND: i64 = 20;

const KEY_STATE_PRESSED: i64 = 0x0a;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum MediaKeyCommand {
    PlayPause,
    Next,
    Previous,
}

/// Release edges and unrecognized key codes decode to `None`.
pub(crate) fn decode_media_key(data: i64) -> Option<MediaKeyCommand> {
    let key_code = (data & 0xffff_0000) >> 16;
    let key_flags = data & 0x0000_ffff;
    if (key_flags & 0xff00) >> 8 != KEY_STATE_PRESSED {
        return None;
    }
    match key_code {
        NX_KEYTYPE_PLAY => Some(MediaKeyCommand::PlayPause),
        NX_KEYTYPE_FAST => Some(MediaKeyCommand::Next),
        NX_KEYTYPE_REWIND => Some(MediaKeyCommand::Previous),
        _ => None,
    }
}
