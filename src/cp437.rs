//! Code page 437, the byte-to-character mapping for entry names and
//! comments in archives that do not set the UTF-8 general purpose bit.

use std::collections::HashMap;
use std::sync::OnceLock;

use crate::error::ArchiveError;

/// The 256 characters of code page 437, in byte order.
static CODE_PAGE: &str = "\u{0}☺☻♥♦♣♠•◘○◙♂♀♪♫☼►◄↕‼¶§▬↨↑↓→←∟↔▲▼ !\"#$%&'()*+,-./0123456789:;<=>?@ABCDEFGHIJKLMNOPQRSTUVWXYZ[\\]^_`abcdefghijklmnopqrstuvwxyz{|}~⌂ÇüéâäàåçêëèïîìÄÅÉæÆôöòûùÿÖÜ¢£¥₧ƒáíóúñÑªº¿⌐¬½¼¡«»░▒▓│┤╡╢╖╕╣║╗╝╜╛┐└┴┬├─┼╞╟╚╔╩╦╠═╬╧╨╤╥╙╘╒╓╫╪┘┌█▄▌▐▀αßΓπΣσµτΦΘΩδ∞φε∩≡±≥≤⌠⌡÷≈°∙·√ⁿ²■\u{a0}";

static FORWARD: OnceLock<[char; 256]> = OnceLock::new();
static REVERSE: OnceLock<HashMap<char, u8>> = OnceLock::new();

fn forward_table() -> &'static [char; 256] {
    FORWARD.get_or_init(|| {
        let mut table = ['\u{0}'; 256];
        for (byte, character) in CODE_PAGE.chars().enumerate() {
            table[byte] = character;
        }
        table
    })
}

fn reverse_table() -> &'static HashMap<char, u8> {
    REVERSE.get_or_init(|| {
        CODE_PAGE
            .chars()
            .enumerate()
            .map(|(byte, character)| (character, byte as u8))
            .collect()
    })
}

/// Map cp437 bytes to text. Every byte has a mapping, so this cannot fail.
pub fn decode(bytes: &[u8]) -> String {
    let table = forward_table();
    bytes.iter().map(|&b| table[b as usize]).collect()
}

fn is_printable_ascii(text: &str) -> bool {
    text.bytes().all(|b| (0x20..=0x7E).contains(&b))
}

/// Map text to cp437 bytes.
///
/// Printable ASCII is its own encoding and skips the table; anything else
/// goes through the reverse mapping, which is built on first use.
pub fn encode(text: &str) -> Result<Vec<u8>, ArchiveError> {
    if is_printable_ascii(text) {
        return Ok(text.as_bytes().to_vec());
    }

    let table = reverse_table();
    text.chars()
        .map(|c| table.get(&c).copied().ok_or(ArchiveError::InvalidCp437(c)))
        .collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn every_byte_round_trips() {
        for b in 0..=255u8 {
            let text = decode(&[b]);
            let bytes = encode(&text).unwrap();
            assert_eq!(bytes, vec![b], "byte 0x{:02X}", b);
        }
    }

    #[test]
    fn printable_ascii_is_identity() {
        let text = "report (final) v2_1.txt";
        assert_eq!(encode(text).unwrap(), text.as_bytes());
        assert_eq!(decode(text.as_bytes()), text);
    }

    #[test]
    fn high_half_decodes() {
        assert_eq!(decode(&[0x82, 0x85, 0x8A]), "éàè");
        assert_eq!(encode("éàè").unwrap(), vec![0x82, 0x85, 0x8A]);
    }

    #[test]
    fn unmappable_character_fails() {
        assert!(matches!(
            encode("snowman ☃"),
            Err(ArchiveError::InvalidCp437('☃'))
        ));
    }

    #[test]
    fn table_has_exactly_256_characters() {
        assert_eq!(CODE_PAGE.chars().count(), 256);
    }
}
