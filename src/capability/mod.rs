//! Capability model: the typed description of a HID device's controls.
//!
//! Built once per device from its report descriptor and immutable afterwards.
//!
//! ## Addressing
//! Input controls share one index space: button ranges first, in descriptor
//! order, followed by value capabilities. A device with one 8-button range and
//! two axes therefore exposes indices `0..8` as booleans and `8..10` as floats.
//! Outputs use the same layout over the output mirrors.
//!
//! ## Classification
//! - 1-bit variable fields with a `0..=1` logical range are button ranges.
//! - Array fields are button ranges over their usage range; each slot of the
//!   report holds the index of one pressed usage.
//! - Other variable fields yield one value capability per element.
//! - Constant fields are padding.

pub mod descriptor;
pub mod report;
pub mod usage;

use crate::event::{ControlDesc, ControlKind};
use descriptor::{DescriptorError, FieldUsages, ParsedDescriptor, ReportField, ReportKind};
use tracing::warn;

/// Ranges this long are treated as corrupt.
pub const MAX_RANGE_LEN: i64 = 0xFFFF;

/// How a button range is packed into its report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ButtonLayout {
    /// One bit per usage.
    Bitfield { bit_size: u32 },
    /// `slots` indices of `slot_bits` each; a slot value `v` selects usage
    /// `map[v - logical_min]` (or `usage_min + v - logical_min` without a map).
    Array {
        slot_bits: u32,
        slots: u32,
        logical_min: i32,
        map: Option<Vec<u16>>,
    },
}

/// Contiguous range of boolean controls.
#[derive(Debug, Clone, PartialEq)]
pub struct ButtonRange {
    pub report_id: u8,
    pub usage_page: u16,
    pub usage_min: u16,
    pub usage_max: u16,
    pub bit_offset: u32,
    pub layout: ButtonLayout,
    pub names: Vec<String>,
}

impl ButtonRange {
    pub fn len(&self) -> usize {
        (self.usage_max as usize + 1).saturating_sub(self.usage_min as usize)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Bits the range occupies inside its report.
    pub fn bit_len(&self) -> u32 {
        match &self.layout {
            ButtonLayout::Bitfield { bit_size } => *bit_size,
            ButtonLayout::Array {
                slot_bits, slots, ..
            } => slot_bits * slots,
        }
    }
}

/// One scaled numeric control.
#[derive(Debug, Clone, PartialEq)]
pub struct ValueCap {
    pub report_id: u8,
    pub usage_page: u16,
    pub usage: u16,
    pub bit_offset: u32,
    pub bit_size: u32,
    pub logical_min: i32,
    pub logical_max: i32,
    pub name: String,
}

impl ValueCap {
    pub fn is_hat(&self) -> bool {
        usage::is_hat_switch(self.usage_page, self.usage)
    }

    pub fn is_signed(&self) -> bool {
        self.logical_min < 0
    }

    /// Value reported before any input arrives. Hats start neutral.
    pub fn initial_value(&self) -> f32 {
        if self.is_hat() {
            -1.0
        } else {
            0.5
        }
    }
}

/// Where an index lands in the unified control space.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlRef {
    /// `range`-th button range, `offset` inside it.
    Button { range: usize, offset: usize },
    /// `index`-th value capability.
    Value(usize),
}

/// Typed description of a device's addressable controls.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CapabilityModel {
    pub buttons: Vec<ButtonRange>,
    pub values: Vec<ValueCap>,
    pub button_outputs: Vec<ButtonRange>,
    pub value_outputs: Vec<ValueCap>,
    pub uses_report_ids: bool,
    pub usage_page: Option<u16>,
    pub usage: Option<u16>,
}

impl CapabilityModel {
    /// Parse a raw descriptor and classify its fields.
    pub fn from_descriptor(bytes: &[u8]) -> Result<Self, DescriptorError> {
        Ok(Self::from_parsed(descriptor::parse(bytes)?))
    }

    pub fn from_parsed(parsed: ParsedDescriptor) -> Self {
        let mut model = CapabilityModel {
            uses_report_ids: parsed.uses_report_ids,
            usage_page: parsed.top_level_usage_page,
            usage: parsed.top_level_usage,
            ..Default::default()
        };

        for field in &parsed.fields {
            if field.flags.is_constant() || field.report_size == 0 || field.report_count == 0 {
                continue;
            }
            if field.report_count as i64 >= MAX_RANGE_LEN {
                warn!(
                    report_count = field.report_count,
                    "skipping capability range with corrupt count"
                );
                continue;
            }
            let (buttons, values, button_label, value_label) = match field.kind {
                ReportKind::Input => (
                    &mut model.buttons,
                    &mut model.values,
                    usage::FALLBACK_BUTTON,
                    usage::FALLBACK_VALUE,
                ),
                ReportKind::Output => (
                    &mut model.button_outputs,
                    &mut model.value_outputs,
                    usage::FALLBACK_BUTTON_OUTPUT,
                    usage::FALLBACK_VALUE_OUTPUT,
                ),
                ReportKind::Feature => continue,
            };

            if !field.flags.is_variable() {
                if let Some(range) = array_range(field, button_label) {
                    buttons.push(range);
                }
            } else if field.report_size == 1 && field.logical_max - field.logical_min == 1 {
                bitfield_ranges(field, button_label, buttons);
            } else {
                value_caps(field, value_label, values);
            }
        }

        model
    }

    pub fn button_count(&self) -> usize {
        self.buttons.iter().map(ButtonRange::len).sum()
    }

    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Number of addressable input indices.
    pub fn control_count(&self) -> usize {
        self.button_count() + self.value_count()
    }

    pub fn button_output_count(&self) -> usize {
        self.button_outputs.iter().map(ButtonRange::len).sum()
    }

    /// Number of addressable output indices.
    pub fn output_count(&self) -> usize {
        self.button_output_count() + self.value_outputs.len()
    }

    /// Resolve an input index.
    pub fn locate(&self, index: usize) -> Option<ControlRef> {
        locate_in(&self.buttons, self.values.len(), index)
    }

    /// Resolve an output index.
    pub fn locate_output(&self, index: usize) -> Option<ControlRef> {
        locate_in(&self.button_outputs, self.value_outputs.len(), index)
    }

    /// Name of the input control at `index`.
    pub fn control_name(&self, index: usize) -> Option<&str> {
        match self.locate(index)? {
            ControlRef::Button { range, offset } => {
                self.buttons[range].names.get(offset).map(String::as_str)
            }
            ControlRef::Value(i) => Some(self.values[i].name.as_str()),
        }
    }

    /// Name of the output control at `index`.
    pub fn output_name(&self, index: usize) -> Option<&str> {
        match self.locate_output(index)? {
            ControlRef::Button { range, offset } => self.button_outputs[range]
                .names
                .get(offset)
                .map(String::as_str),
            ControlRef::Value(i) => Some(self.value_outputs[i].name.as_str()),
        }
    }

    /// Enumerate every input and output control for UIs.
    pub fn describe(&self) -> Vec<ControlDesc> {
        let mut out = Vec::with_capacity(self.control_count() + self.output_count());
        describe_into(&mut out, &self.buttons, &self.values, false);
        describe_into(&mut out, &self.button_outputs, &self.value_outputs, true);
        out
    }
}

fn locate_in(ranges: &[ButtonRange], value_count: usize, index: usize) -> Option<ControlRef> {
    let mut rest = index;
    for (i, r) in ranges.iter().enumerate() {
        if rest < r.len() {
            return Some(ControlRef::Button {
                range: i,
                offset: rest,
            });
        }
        rest -= r.len();
    }
    (rest < value_count).then_some(ControlRef::Value(rest))
}

fn describe_into(
    out: &mut Vec<ControlDesc>,
    buttons: &[ButtonRange],
    values: &[ValueCap],
    output: bool,
) {
    let mut idx = 0u32;
    for range in buttons {
        for (offset, name) in range.names.iter().enumerate() {
            out.push(ControlDesc {
                kind: if output {
                    ControlKind::ButtonOutput
                } else {
                    ControlKind::Button
                },
                idx,
                name: name.clone(),
                logical_min: 0,
                logical_max: 1,
                usage_page: Some(range.usage_page),
                usage: Some(range.usage_min.saturating_add(offset as u16)),
            });
            idx += 1;
        }
    }
    for cap in values {
        let kind = match (output, cap.is_hat()) {
            (true, _) => ControlKind::ValueOutput,
            (false, true) => ControlKind::Hat,
            (false, false) => ControlKind::Value,
        };
        out.push(ControlDesc {
            kind,
            idx,
            name: cap.name.clone(),
            logical_min: cap.logical_min,
            logical_max: cap.logical_max,
            usage_page: Some(cap.usage_page),
            usage: Some(cap.usage),
        });
        idx += 1;
    }
}

fn range_names(page: u16, min: u16, max: u16, fallback: &str) -> Vec<String> {
    (min..=max)
        .map(|u| usage::usage_name(page, u).unwrap_or_else(|| fallback.to_string()))
        .collect()
}

/// Validates `[min, max]`, logging and rejecting corrupt lengths.
fn checked_len(min: u16, max: u16) -> Option<i64> {
    let len = max as i64 - min as i64 + 1;
    if len >= MAX_RANGE_LEN {
        warn!(usage_min = min, usage_max = max, "skipping bad button capability range");
        return None;
    }
    (len > 0).then_some(len)
}

fn array_range(field: &ReportField, fallback: &str) -> Option<ButtonRange> {
    let (page, min, max, map) = match &field.usages {
        FieldUsages::Range { page, min, max } => (*page, *min, *max, None),
        FieldUsages::List(list) => {
            let page = list.first().map(|u| u.0).unwrap_or(field.usage_page);
            let min = list.iter().map(|u| u.1).min()?;
            let max = list.iter().map(|u| u.1).max()?;
            (page, min, max, Some(list.iter().map(|u| u.1).collect()))
        }
        FieldUsages::None => return None,
    };
    checked_len(min, max)?;
    Some(ButtonRange {
        report_id: field.report_id,
        usage_page: page,
        usage_min: min,
        usage_max: max,
        bit_offset: field.bit_offset,
        layout: ButtonLayout::Array {
            slot_bits: field.report_size,
            slots: field.report_count,
            logical_min: field.logical_min,
            map,
        },
        names: range_names(page, min, max, fallback),
    })
}

fn bitfield_ranges(field: &ReportField, fallback: &str, out: &mut Vec<ButtonRange>) {
    match &field.usages {
        FieldUsages::Range { page, min, max } => {
            let Some(len) = checked_len(*min, *max) else {
                return;
            };
            // bits past the usage range map to nothing
            let bits = (field.report_count as i64).min(len) as u32;
            let max = (*min as u32 + bits - 1) as u16;
            out.push(ButtonRange {
                report_id: field.report_id,
                usage_page: *page,
                usage_min: *min,
                usage_max: max,
                bit_offset: field.bit_offset,
                layout: ButtonLayout::Bitfield { bit_size: bits },
                names: range_names(*page, *min, max, fallback),
            });
        }
        FieldUsages::List(_) => {
            for i in 0..field.report_count {
                let Some((page, u)) = field.usage_at(i as usize) else {
                    continue;
                };
                out.push(ButtonRange {
                    report_id: field.report_id,
                    usage_page: page,
                    usage_min: u,
                    usage_max: u,
                    bit_offset: field.bit_offset.saturating_add(i),
                    layout: ButtonLayout::Bitfield { bit_size: 1 },
                    names: range_names(page, u, u, fallback),
                });
            }
        }
        FieldUsages::None => {}
    }
}

fn value_caps(field: &ReportField, fallback: &str, out: &mut Vec<ValueCap>) {
    if field.report_size > 32 {
        warn!(
            report_size = field.report_size,
            "skipping value capability wider than 32 bits"
        );
        return;
    }
    for i in 0..field.report_count {
        let (page, u) = field.usage_at(i as usize).unwrap_or((field.usage_page, 0));
        out.push(ValueCap {
            report_id: field.report_id,
            usage_page: page,
            usage: u,
            bit_offset: field.bit_offset.saturating_add(i * field.report_size),
            bit_size: field.report_size,
            logical_min: field.logical_min,
            logical_max: field.logical_max,
            name: usage::usage_name(page, u).unwrap_or_else(|| fallback.to_string()),
        });
    }
}
