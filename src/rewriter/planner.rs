// SPDX-License-Identifier: GPL-3.0-or-later
// Copyright (C) 2026 Erik van der Tier

use std::collections::BTreeMap;
use std::mem;

use log::debug;

use super::classifier::{ClassifiedDocument, Instruction, InstructionKey, LineClass};
use super::config::RewriterConfig;
use super::error::RewriteError;
use super::layout::{format_instruction, format_macro_terminal, DEFINE_MARKER};
use super::literal::{slice_encoding, tokens_to_bytes};
use super::packer::{pack_group, PackMember};
use super::surface_tokenizer::{
    restore_leading_tab, LineEnding, SurfaceDocument, SurfaceLine, COMMENT_DELIMITER,
};

/// Oracle encodings keyed by instruction.
pub type EncodingTable = BTreeMap<InstructionKey, Vec<u8>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    pub line_number: usize,
    /// `None` for source lines that are regenerated by their owner.
    pub output: Option<SurfaceLine>,
    pub generated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RewritePlan {
    pub lines: Vec<PlannedLine>,
}

impl RewritePlan {
    pub fn generated_line_count(&self) -> usize {
        self.lines.iter().filter(|line| line.generated).count()
    }

    /// Planned output lines, skipping the ones regenerated by their owner.
    pub fn output_lines(&self) -> impl Iterator<Item = &SurfaceLine> {
        self.lines.iter().filter_map(|line| line.output.as_ref())
    }
}

/// Consecutive encoded instructions sharing one `in_define` setting.
#[derive(Debug)]
struct PendingGroup {
    members: Vec<InstructionKey>,
    in_define: bool,
    /// Closed to further members, used for the line that ends a macro body.
    sealed: bool,
}

impl PendingGroup {
    fn open(key: InstructionKey, in_define: bool, sealed: bool) -> Self {
        Self {
            members: vec![key],
            in_define,
            sealed,
        }
    }

    fn admits(&self, in_define: bool) -> bool {
        !self.sealed && self.in_define == in_define
    }
}

/// Group accumulation state. Flushing is the transition `flush` performs
/// back to `Idle`.
#[derive(Debug, Default)]
enum PlannerState {
    #[default]
    Idle,
    AccumulatingGroup(PendingGroup),
}

struct Planner<'a> {
    doc: &'a SurfaceDocument,
    classified: &'a ClassifiedDocument,
    encodings: &'a EncodingTable,
    config: &'a RewriterConfig,
    state: PlannerState,
    plan: RewritePlan,
}

pub fn plan_document(
    doc: &SurfaceDocument,
    classified: &ClassifiedDocument,
    encodings: &EncodingTable,
    config: &RewriterConfig,
) -> Result<RewritePlan, RewriteError> {
    let mut planner = Planner {
        doc,
        classified,
        encodings,
        config,
        state: PlannerState::Idle,
        plan: RewritePlan {
            lines: Vec::with_capacity(doc.lines.len()),
        },
    };
    for index in 0..classified.lines.len().min(doc.lines.len()) {
        planner.step(index)?;
    }
    planner.flush()?;
    Ok(planner.plan)
}

impl<'a> Planner<'a> {
    fn step(&mut self, index: usize) -> Result<(), RewriteError> {
        let classified = self.classified;
        match &classified.lines[index].class {
            LineClass::Passthrough => {
                self.flush()?;
                self.plan.lines.push(PlannedLine {
                    line_number: index + 1,
                    output: Some(self.doc.lines[index].clone()),
                    generated: false,
                });
            }
            LineClass::ContinuationOfPrevious { .. } => {
                self.plan.lines.push(PlannedLine {
                    line_number: index + 1,
                    output: None,
                    generated: false,
                });
            }
            LineClass::EncodeRequest(instruction) => {
                self.accept(InstructionKey::new(index, 0), instruction.in_define)?
            }
            LineClass::AlreadyEncoded {
                instructions,
                tokens,
            } => {
                let refreshed = instructions.len() == 1
                    && self
                        .encodings
                        .get(&InstructionKey::new(index, 0))
                        .is_some_and(|bytes| *bytes != tokens_to_bytes(tokens));
                if refreshed {
                    debug!(
                        "line {}: existing literal differs from encoder output, refreshing",
                        index + 1
                    );
                }
                for (slot, instruction) in instructions.iter().enumerate() {
                    self.accept(InstructionKey::new(index, slot), instruction.in_define)?;
                }
            }
        }
        Ok(())
    }

    fn accept(&mut self, key: InstructionKey, in_define: bool) -> Result<(), RewriteError> {
        // A plain instruction right after a macro line terminates the macro
        // and stays on its own.
        let terminal = !in_define && self.follows_macro_line(key);
        match mem::take(&mut self.state) {
            PlannerState::AccumulatingGroup(mut group)
                if !terminal && group.admits(in_define) =>
            {
                group.members.push(key);
                self.state = PlannerState::AccumulatingGroup(group);
            }
            previous => {
                self.state = previous;
                self.flush()?;
                self.state =
                    PlannerState::AccumulatingGroup(PendingGroup::open(key, in_define, terminal));
            }
        }
        Ok(())
    }

    /// Whether the source line before the instruction's line continues a
    /// macro body, i.e. its code part ends with the marker.
    fn follows_macro_line(&self, key: InstructionKey) -> bool {
        if key.slot > 0 || key.line == 0 {
            return false;
        }
        let previous = &self.doc.lines[key.line - 1].expanded;
        let code = previous
            .split(COMMENT_DELIMITER)
            .next()
            .unwrap_or_default();
        code.trim_end().ends_with(DEFINE_MARKER)
    }

    fn flush(&mut self) -> Result<(), RewriteError> {
        match mem::take(&mut self.state) {
            PlannerState::AccumulatingGroup(group) => self.emit_group(&group),
            PlannerState::Idle => Ok(()),
        }
    }

    fn emit_group(&mut self, group: &PendingGroup) -> Result<(), RewriteError> {
        let (classified, encodings) = (self.classified, self.encodings);
        let mut members: Vec<(InstructionKey, &'a Instruction, &'a [u8])> =
            Vec::with_capacity(group.members.len());
        for &key in &group.members {
            let Some(instruction) = classified.lines[key.line].class.instructions().get(key.slot)
            else {
                continue;
            };
            let encoding = encodings.get(&key).ok_or_else(|| {
                RewriteError::ListingCorrelation {
                    backend: "encoder".to_string(),
                    detail: format!("no encoding recorded for line {}", key.line + 1),
                }
            })?;
            members.push((key, instruction, encoding.as_slice()));
        }
        let (Some(&(_, first, _)), Some(&(last_key, _, _))) = (members.first(), members.last())
        else {
            return Ok(());
        };

        if self.config.pack && !group.in_define && members.len() > 1 {
            let pack_members: Vec<PackMember<'_>> = members
                .iter()
                .map(|&(_, instruction, encoding)| PackMember {
                    instruction,
                    encoding,
                })
                .collect();
            let lines = pack_group(&pack_members, self.config);
            self.emit_generated(lines, first, last_key.line);
            return Ok(());
        }

        let token_set = self.config.token_set();
        let line_budget = self.config.line_budget;
        for (key, instruction, encoding) in members {
            let tokens = slice_encoding(encoding, token_set);
            let lines = if group.sealed {
                format_macro_terminal(&tokens, instruction, line_budget)
            } else {
                format_instruction(&tokens, instruction, line_budget)
            };
            self.emit_generated(lines.into_lines(), instruction, key.line);
        }
        Ok(())
    }

    /// Pushes generated lines. Inner lines reuse the ending of the source
    /// line at `ending_index`; the last line keeps it exactly.
    fn emit_generated(&mut self, lines: Vec<String>, owner: &Instruction, ending_index: usize) {
        let final_ending = self.doc.lines[ending_index].line_ending;
        let inner_ending = match final_ending {
            LineEnding::None => self.doc.preferred_line_ending(),
            ending => ending,
        };
        let count = lines.len();
        for (position, text) in lines.into_iter().enumerate() {
            let ending = if position + 1 == count {
                final_ending
            } else {
                inner_ending
            };
            let text = restore_leading_tab(&text, owner.starts_with_tab);
            self.plan.lines.push(PlannedLine {
                line_number: owner.line_number,
                output: Some(SurfaceLine::new(&text, ending)),
                generated: true,
            });
        }
    }
}
