//! HID report descriptor item parser.
//!
//! Walks the short-item stream of a report descriptor, tracking the global
//! state stack and local usage list, and emits one [`ReportField`] per
//! Input/Output/Feature main item with its bit offset inside the report.
//! Long items are skipped. Collections are only tracked to find the
//! top-level application usage.

use std::collections::HashMap;
use tracing::warn;

/// Upper bound on the bit length of a single main item.
const MAX_FIELD_BITS: u64 = 0xFFFF * 8;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DescriptorError {
    #[error("descriptor is empty")]
    Empty,
    #[error("item at offset {offset} is truncated")]
    Truncated { offset: usize },
    #[error("pop at offset {offset} without a matching push")]
    PopUnderflow { offset: usize },
}

/// Which report a main item belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReportKind {
    Input,
    Output,
    Feature,
}

/// Data bits of an Input/Output/Feature item.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MainFlags(pub u32);

impl MainFlags {
    pub fn is_constant(self) -> bool {
        self.0 & 0x01 != 0
    }
    pub fn is_variable(self) -> bool {
        self.0 & 0x02 != 0
    }
    pub fn is_relative(self) -> bool {
        self.0 & 0x04 != 0
    }
    pub fn has_null_state(self) -> bool {
        self.0 & 0x40 != 0
    }
}

/// Usage list attached to a main item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldUsages {
    /// Explicit `(page, usage)` list, in declaration order.
    List(Vec<(u16, u16)>),
    /// `Usage Minimum`..=`Usage Maximum` on one page.
    Range { page: u16, min: u16, max: u16 },
    None,
}

/// One Input/Output/Feature main item.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportField {
    pub kind: ReportKind,
    pub report_id: u8,
    /// Offset in bits from the start of the report payload (after the id byte).
    pub bit_offset: u32,
    pub report_size: u32,
    pub report_count: u32,
    pub usage_page: u16,
    pub usages: FieldUsages,
    pub logical_min: i32,
    pub logical_max: i32,
    pub flags: MainFlags,
}

impl ReportField {
    /// Usage of the `i`-th element. Elements past the list repeat the last usage.
    pub fn usage_at(&self, i: usize) -> Option<(u16, u16)> {
        match &self.usages {
            FieldUsages::List(list) => list.get(i).or_else(|| list.last()).copied(),
            FieldUsages::Range { page, min, max } => {
                let u = (*min as usize + i).min(*max as usize);
                Some((*page, u as u16))
            }
            FieldUsages::None => None,
        }
    }

    pub fn total_bits(&self) -> u32 {
        self.report_size.saturating_mul(self.report_count)
    }
}

/// Result of a descriptor walk.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedDescriptor {
    pub fields: Vec<ReportField>,
    pub top_level_usage_page: Option<u16>,
    pub top_level_usage: Option<u16>,
    pub uses_report_ids: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct Globals {
    usage_page: u16,
    logical_min: i32,
    logical_max: i32,
    logical_max_unsigned: u32,
    report_size: u32,
    report_id: u8,
    report_count: u32,
}

#[derive(Debug, Default)]
struct Locals {
    // (explicit page, usage id); page is None for short usages.
    usages: Vec<(Option<u16>, u16)>,
    usage_min: Option<(Option<u16>, u16)>,
    usage_max: Option<(Option<u16>, u16)>,
}

impl Locals {
    fn resolve(&self, current_page: u16) -> FieldUsages {
        if let (Some((pmin, min)), Some((_, max))) = (self.usage_min, self.usage_max) {
            return FieldUsages::Range {
                page: pmin.unwrap_or(current_page),
                min,
                max,
            };
        }
        if self.usages.is_empty() {
            return FieldUsages::None;
        }
        FieldUsages::List(
            self.usages
                .iter()
                .map(|&(p, u)| (p.unwrap_or(current_page), u))
                .collect(),
        )
    }
}

fn read_unsigned(data: &[u8]) -> u32 {
    data.iter()
        .enumerate()
        .fold(0u32, |acc, (i, b)| acc | (*b as u32) << (8 * i))
}

fn read_signed(data: &[u8]) -> i32 {
    let raw = read_unsigned(data);
    match data.len() {
        1 => raw as u8 as i8 as i32,
        2 => raw as u16 as i16 as i32,
        4 => raw as i32,
        _ => 0,
    }
}

fn read_usage(data: &[u8]) -> (Option<u16>, u16) {
    let raw = read_unsigned(data);
    if data.len() == 4 {
        (Some((raw >> 16) as u16), raw as u16)
    } else {
        (None, raw as u16)
    }
}

/// Parse a raw report descriptor.
pub fn parse(bytes: &[u8]) -> Result<ParsedDescriptor, DescriptorError> {
    if bytes.is_empty() {
        return Err(DescriptorError::Empty);
    }

    let mut out = ParsedDescriptor::default();
    let mut globals = Globals::default();
    let mut stack: Vec<Globals> = Vec::new();
    let mut locals = Locals::default();
    let mut offsets: HashMap<(ReportKind, u8), u32> = HashMap::new();
    let mut depth = 0usize;

    let mut pos = 0usize;
    while pos < bytes.len() {
        let prefix = bytes[pos];

        // long item: 0xFE, size, tag, data...
        if prefix == 0xFE {
            let size = *bytes
                .get(pos + 1)
                .ok_or(DescriptorError::Truncated { offset: pos })? as usize;
            pos += 3 + size;
            if pos > bytes.len() {
                return Err(DescriptorError::Truncated { offset: pos });
            }
            continue;
        }

        let size = match prefix & 0x03 {
            3 => 4,
            n => n as usize,
        };
        let item_type = (prefix >> 2) & 0x03;
        let tag = prefix >> 4;
        let data = bytes
            .get(pos + 1..pos + 1 + size)
            .ok_or(DescriptorError::Truncated { offset: pos })?;
        let item_offset = pos;
        pos += 1 + size;

        match item_type {
            // main
            0 => match tag {
                0x8 | 0x9 | 0xB => {
                    let kind = match tag {
                        0x8 => ReportKind::Input,
                        0x9 => ReportKind::Output,
                        _ => ReportKind::Feature,
                    };
                    let bits = globals.report_size as u64 * globals.report_count as u64;
                    let slot = offsets.entry((kind, globals.report_id)).or_insert(0);
                    if bits > MAX_FIELD_BITS {
                        warn!(offset = item_offset, bits, "skipping oversized main item");
                        *slot = slot.saturating_add(bits.min(u32::MAX as u64) as u32);
                        locals = Locals::default();
                        continue;
                    }
                    let logical_max = if globals.logical_min >= 0
                        && globals.logical_max < globals.logical_min
                    {
                        globals.logical_max_unsigned.min(i32::MAX as u32) as i32
                    } else {
                        globals.logical_max
                    };
                    out.fields.push(ReportField {
                        kind,
                        report_id: globals.report_id,
                        bit_offset: *slot,
                        report_size: globals.report_size,
                        report_count: globals.report_count,
                        usage_page: globals.usage_page,
                        usages: locals.resolve(globals.usage_page),
                        logical_min: globals.logical_min,
                        logical_max,
                        flags: MainFlags(read_unsigned(data)),
                    });
                    *slot = slot.saturating_add(bits as u32);
                    locals = Locals::default();
                }
                // collection
                0xA => {
                    let collection_type = read_unsigned(data);
                    if depth == 0 && collection_type == 0x01 && out.top_level_usage.is_none() {
                        if let Some(&(page, usage)) = locals.usages.first() {
                            out.top_level_usage_page = Some(page.unwrap_or(globals.usage_page));
                            out.top_level_usage = Some(usage);
                        }
                    }
                    depth += 1;
                    locals = Locals::default();
                }
                // end collection
                0xC => {
                    depth = depth.saturating_sub(1);
                    locals = Locals::default();
                }
                _ => locals = Locals::default(),
            },
            // global
            1 => match tag {
                0x0 => globals.usage_page = read_unsigned(data) as u16,
                0x1 => globals.logical_min = read_signed(data),
                0x2 => {
                    globals.logical_max = read_signed(data);
                    globals.logical_max_unsigned = read_unsigned(data);
                }
                0x7 => globals.report_size = read_unsigned(data),
                0x8 => {
                    globals.report_id = read_unsigned(data) as u8;
                    out.uses_report_ids = true;
                }
                0x9 => globals.report_count = read_unsigned(data),
                0xA => stack.push(globals),
                0xB => {
                    globals = stack
                        .pop()
                        .ok_or(DescriptorError::PopUnderflow { offset: item_offset })?;
                }
                // physical min/max, unit exponent, unit
                _ => {}
            },
            // local
            2 => match tag {
                0x0 => locals.usages.push(read_usage(data)),
                0x1 => locals.usage_min = Some(read_usage(data)),
                0x2 => locals.usage_max = Some(read_usage(data)),
                _ => {}
            },
            _ => {}
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Gamepad: 8 buttons, X/Y bytes, one 4-bit hat + 4 bits padding.
    const GAMEPAD: &[u8] = &[
        0x05, 0x01, // Usage Page (Generic Desktop)
        0x09, 0x05, // Usage (Gamepad)
        0xA1, 0x01, // Collection (Application)
        0x05, 0x09, //   Usage Page (Button)
        0x19, 0x01, //   Usage Minimum (1)
        0x29, 0x08, //   Usage Maximum (8)
        0x15, 0x00, //   Logical Minimum (0)
        0x25, 0x01, //   Logical Maximum (1)
        0x75, 0x01, //   Report Size (1)
        0x95, 0x08, //   Report Count (8)
        0x81, 0x02, //   Input (Data,Var,Abs)
        0x05, 0x01, //   Usage Page (Generic Desktop)
        0x09, 0x30, //   Usage (X)
        0x09, 0x31, //   Usage (Y)
        0x15, 0x00, //   Logical Minimum (0)
        0x26, 0xFF, 0x00, // Logical Maximum (255)
        0x75, 0x08, //   Report Size (8)
        0x95, 0x02, //   Report Count (2)
        0x81, 0x02, //   Input (Data,Var,Abs)
        0xC0, // End Collection
    ];

    #[test]
    fn test_gamepad_fields_and_offsets() {
        let parsed = parse(GAMEPAD).unwrap();
        assert_eq!(parsed.top_level_usage_page, Some(0x01));
        assert_eq!(parsed.top_level_usage, Some(0x05));
        assert!(!parsed.uses_report_ids);
        assert_eq!(parsed.fields.len(), 2);

        let buttons = &parsed.fields[0];
        assert_eq!(buttons.kind, ReportKind::Input);
        assert_eq!(buttons.bit_offset, 0);
        assert_eq!(buttons.total_bits(), 8);
        assert_eq!(
            buttons.usages,
            FieldUsages::Range {
                page: 0x09,
                min: 1,
                max: 8
            }
        );

        let axes = &parsed.fields[1];
        assert_eq!(axes.bit_offset, 8);
        assert_eq!(axes.logical_max, 255);
        assert_eq!(axes.usage_at(1), Some((0x01, 0x31)));
        assert_eq!(axes.usage_at(5), Some((0x01, 0x31)));
        assert!(axes.flags.is_variable());
    }

    #[test]
    fn test_one_byte_logical_max_is_reinterpreted_unsigned() {
        let desc = [
            0x05, 0x01, 0x09, 0x30, 0x15, 0x00, 0x25, 0xFF, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
        ];
        let parsed = parse(&desc).unwrap();
        assert_eq!(parsed.fields[0].logical_min, 0);
        assert_eq!(parsed.fields[0].logical_max, 255);
    }

    #[test]
    fn test_signed_logical_range_is_kept() {
        let desc = [
            0x05, 0x01, 0x09, 0x30, 0x15, 0x81, 0x25, 0x7F, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
        ];
        let parsed = parse(&desc).unwrap();
        assert_eq!(parsed.fields[0].logical_min, -127);
        assert_eq!(parsed.fields[0].logical_max, 127);
    }

    #[test]
    fn test_report_ids_keep_separate_offsets() {
        let desc = [
            0x85, 0x01, 0x05, 0x09, 0x19, 0x01, 0x29, 0x04, 0x75, 0x01, 0x95, 0x04, 0x81, 0x02,
            0x85, 0x02, 0x05, 0x09, 0x19, 0x01, 0x29, 0x04, 0x75, 0x01, 0x95, 0x04, 0x91, 0x02,
            0x85, 0x01, 0x75, 0x04, 0x95, 0x01, 0x81, 0x03,
        ];
        let parsed = parse(&desc).unwrap();
        assert!(parsed.uses_report_ids);
        assert_eq!(parsed.fields.len(), 3);
        assert_eq!(parsed.fields[1].kind, ReportKind::Output);
        assert_eq!(parsed.fields[1].bit_offset, 0);
        // padding in report 1 continues after the first 4 bits
        assert_eq!(parsed.fields[2].bit_offset, 4);
        assert!(parsed.fields[2].flags.is_constant());
    }

    #[test]
    fn test_push_pop_restores_globals() {
        let desc = [
            0x05, 0x01, 0xA4, 0x05, 0x09, 0xB4, 0x09, 0x30, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
        ];
        let parsed = parse(&desc).unwrap();
        assert_eq!(parsed.fields[0].usage_page, 0x01);
    }

    #[test]
    fn test_errors() {
        assert_eq!(parse(&[]), Err(DescriptorError::Empty));
        assert_eq!(
            parse(&[0x05, 0x01, 0x26, 0xFF]),
            Err(DescriptorError::Truncated { offset: 2 })
        );
        assert_eq!(
            parse(&[0xB4]),
            Err(DescriptorError::PopUnderflow { offset: 0 })
        );
    }

    #[test]
    fn test_oversized_item_is_skipped() {
        // 8 buttons, then 0xFFFF slots of 32 bits, then X
        let desc = [
            0x05, 0x09, 0x19, 0x01, 0x29, 0x08, 0x15, 0x00, 0x25, 0x01, 0x75, 0x01, 0x95, 0x08,
            0x81, 0x02, 0x75, 0x20, 0x96, 0xFF, 0xFF, 0x81, 0x03, 0x05, 0x01, 0x09, 0x30, 0x75,
            0x08, 0x95, 0x01, 0x81, 0x02,
        ];
        let parsed = parse(&desc).unwrap();
        assert_eq!(parsed.fields.len(), 2);
        assert_eq!(parsed.fields[0].report_count, 8);
        assert_eq!(parsed.fields[1].bit_offset, 8 + 32 * 0xFFFF);
    }

    #[test]
    fn test_offsets_saturate() {
        // 0xFFFFFFFF-bit items repeated cannot wrap the offset
        let mut desc = vec![0x77, 0xFF, 0xFF, 0xFF, 0xFF, 0x97, 0xFF, 0xFF, 0xFF, 0xFF];
        for _ in 0..4 {
            desc.extend_from_slice(&[0x81, 0x03]);
        }
        desc.extend_from_slice(&[0x75, 0x08, 0x95, 0x01, 0x81, 0x02]);
        let parsed = parse(&desc).unwrap();
        assert_eq!(parsed.fields.len(), 1);
        assert_eq!(parsed.fields[0].bit_offset, u32::MAX);
    }

    #[test]
    fn test_long_items_are_skipped() {
        let desc = [0xFE, 0x02, 0x10, 0xAA, 0xBB, 0x05, 0x01];
        let parsed = parse(&desc).unwrap();
        assert!(parsed.fields.is_empty());
    }

    #[test]
    fn test_extended_usage_carries_its_page() {
        let desc = [
            0x05, 0x01, 0x0B, 0x30, 0x00, 0x02, 0x00, 0x75, 0x08, 0x95, 0x01, 0x81, 0x02,
        ];
        let parsed = parse(&desc).unwrap();
        assert_eq!(parsed.fields[0].usage_at(0), Some((0x02, 0x30)));
    }
}
