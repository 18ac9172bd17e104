//! Card formatters for raw, human-readable and JSON output

use std::fmt::Write as _;

use clap::ValueEnum;
use mfc_card::access_bits::{slot_for_block, BlockAccess, TRAILER_SLOT};
use mfc_card::{ClassicBlock, ClassicCard, Sector, SubType};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum FormatMode {
    /// Raw hex output
    Raw,
    /// Human-readable formatted output
    Human,
    /// The scanned card as JSON
    Json,
}

impl FormatMode {
    pub fn description(&self) -> &'static str {
        match self {
            FormatMode::Raw => "Raw",
            FormatMode::Human => "Human-Readable",
            FormatMode::Json => "JSON",
        }
    }
}

/// Render a scanned card.
pub fn format_card(card: &ClassicCard, mode: FormatMode) -> anyhow::Result<String> {
    match mode {
        FormatMode::Raw => Ok(format_raw(card)),
        FormatMode::Human => Ok(format_human(card)),
        FormatMode::Json => Ok(serde_json::to_string_pretty(card)? + "\n"),
    }
}

fn format_raw(card: &ClassicCard) -> String {
    let mut out = String::new();
    for (index, sector) in card.sectors().iter().enumerate() {
        match sector {
            Sector::Valid(_) => {
                for (block, data) in sector.blocks().iter().enumerate() {
                    let _ = writeln!(out, "{index:02}.{block:02} {}", data.data());
                }
            }
            Sector::Unauthorized => {
                let _ = writeln!(out, "{index:02} UNAUTHORIZED");
            }
            Sector::Invalid(e) => {
                let _ = writeln!(out, "{index:02} INVALID {e}");
            }
        }
    }
    out
}

fn card_title(card: &ClassicCard) -> &'static str {
    match card.sub_type() {
        SubType::Classic => "MIFARE Classic",
        SubType::Plus => "MIFARE Plus (SL3)",
    }
}

fn access_label(access: BlockAccess) -> &'static str {
    match access {
        BlockAccess::Either => "key A or B",
        BlockAccess::KeyBOnly => "key B only",
        BlockAccess::Never => "never",
    }
}

fn format_block(block: &ClassicBlock) -> String {
    if block.is_unauthorized() {
        "(not readable)".to_string()
    } else if block.is_empty() {
        format!("{} (empty)", block.data())
    } else {
        block.data().to_string()
    }
}

fn format_human(card: &ClassicCard) -> String {
    let mut out = String::new();
    let readable = card.sectors().iter().filter(|s| s.is_valid()).count();
    let _ = writeln!(
        out,
        "{}, {} sectors, {} readable{}",
        card_title(card),
        card.sectors().len(),
        readable,
        if card.is_partial_read() { " (partial read)" } else { "" }
    );

    for (index, sector) in card.sectors().iter().enumerate() {
        let _ = writeln!(out);
        match sector {
            Sector::Unauthorized => {
                let _ = writeln!(out, "Sector {index}: no key found");
                continue;
            }
            Sector::Invalid(e) => {
                let _ = writeln!(out, "Sector {index}: read failed ({e})");
                continue;
            }
            Sector::Valid(_) => {}
        }

        let key =
            |k: Option<&mfc_common::Buffer>| k.map_or_else(|| "-".to_string(), |k| k.to_string());
        let _ = writeln!(out, "Sector {index}:");
        let _ = writeln!(out, "  Key A: {}  Key B: {}", key(sector.key_a()), key(sector.key_b()));

        let access = sector.access_bits();
        if let Some(bits) = access {
            let _ = writeln!(out, "  Access: {bits}  GPB: {:02X}", bits.gpb());
        }

        let block_count = sector.blocks().len();
        for (block, data) in sector.blocks().iter().enumerate() {
            let slot = slot_for_block(block, block_count);
            let note = match access {
                Some(_) if slot == TRAILER_SLOT => "  [trailer]".to_string(),
                Some(bits) => format!("  [{}]", access_label(bits.block_access(slot))),
                None => String::new(),
            };
            let _ = writeln!(out, "  Block {block:2}: {}{note}", format_block(data));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use mfc_card::SectorRaw;
    use mfc_common::Buffer;

    fn sample() -> ClassicCard {
        let mut blocks = vec![ClassicBlock::new(Buffer::from([0u8; 16])); 3];
        blocks[1] = ClassicBlock::unauthorized();
        blocks.push(ClassicBlock::new(
            Buffer::from_hex("000000000000ff078069ffffffffffff").unwrap(),
        ));
        let valid = SectorRaw {
            blocks,
            key_a: Some(Buffer::from([0xFF; 6])),
            ..Default::default()
        };
        ClassicCard::new(vec![valid, SectorRaw::unauthorized()], true, SubType::Classic)
    }

    #[test]
    fn test_raw_output() {
        let out = format_card(&sample(), FormatMode::Raw).unwrap();
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0], "00.00 00000000000000000000000000000000");
        assert_eq!(lines[1], "00.01 04");
        assert_eq!(lines[4], "01 UNAUTHORIZED");
    }

    #[test]
    fn test_human_output() {
        let out = format_card(&sample(), FormatMode::Human).unwrap();
        assert!(out.starts_with("MIFARE Classic, 2 sectors, 1 readable (partial read)"));
        assert!(out.contains("Key A: FFFFFFFFFFFF  Key B: -"));
        assert!(out.contains("Access: 000 000 000 001  GPB: 69"));
        assert!(out.contains("Block  1: (not readable)  [key A or B]"));
        assert!(out.contains("Block  0: 00000000000000000000000000000000 (empty)"));
        assert!(out.contains("Sector 1: no key found"));
    }

    #[test]
    fn test_json_output() {
        let out = format_card(&sample(), FormatMode::Json).unwrap();
        let back: ClassicCard = serde_json::from_str(&out).unwrap();
        assert_eq!(back, sample());
    }
}
