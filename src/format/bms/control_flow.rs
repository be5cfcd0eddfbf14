//! `#RANDOM` / `#IF` block evaluation.
//!
//! Blocks are evaluated while reading, so only the lines of the selected branches ever reach
//! the chart model. `#SWITCH` blocks are not supported and their commands are reported as unknown.

use thiserror::Error;

use super::rng::Rng;

/// Misplaced control flow commands. The offending command is ignored.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ControlFlowWarning {
    /// `#IF` outside of any `#RANDOM` block.
    #[error("`#IF` without a preceding `#RANDOM`")]
    IfWithoutRandom,
    /// `#ELSEIF`, `#ELSE` or `#ENDIF` outside of an `#IF` block.
    #[error("`{0}` without a matching `#IF`")]
    UnmatchedBranch(String),
    /// `#ENDRANDOM` outside of any `#RANDOM` block.
    #[error("`#ENDRANDOM` without a matching `#RANDOM`")]
    UnmatchedEndRandom,
    /// Blocks still open at the end of the file.
    #[error("{0} control flow block(s) not closed")]
    Unclosed(usize),
}

#[derive(Debug, Clone, Copy)]
enum Block {
    Random {
        value: u64,
    },
    If {
        /// Whether the current branch is taken, including all enclosing blocks.
        active: bool,
        /// Whether any branch of this `#IF` chain was already taken.
        matched: bool,
        /// Whether the enclosing context is active.
        parent_active: bool,
        value: u64,
    },
}

/// Evaluates control flow commands with a random source.
pub(crate) struct ControlFlow<R> {
    rng: R,
    stack: Vec<Block>,
}

impl<R: Rng> ControlFlow<R> {
    pub(crate) const fn new(rng: R) -> Self {
        Self {
            rng,
            stack: Vec::new(),
        }
    }

    /// Whether commands at the current position take effect.
    pub(crate) fn is_active(&self) -> bool {
        self.stack
            .iter()
            .rev()
            .find_map(|block| match block {
                Block::If { active, .. } => Some(*active),
                Block::Random { .. } => None,
            })
            .unwrap_or(true)
    }

    fn random_value(&self) -> Option<u64> {
        self.stack.iter().rev().find_map(|block| match block {
            Block::Random { value } => Some(*value),
            Block::If { .. } => None,
        })
    }

    /// Handles a control flow command. Returns `None` if `command` is not one.
    pub(crate) fn handle(
        &mut self,
        command: &str,
        arg: &str,
    ) -> Option<Result<(), ControlFlowWarning>> {
        let number = || arg.trim().parse::<u64>().ok();
        Some(match command {
            "RANDOM" => {
                let value = match number() {
                    Some(max) if self.is_active() && max > 0 => self.rng.generate(1..=max),
                    _ => 0,
                };
                self.stack.push(Block::Random { value });
                Ok(())
            }
            "SETRANDOM" => {
                self.stack.push(Block::Random {
                    value: number().unwrap_or(0),
                });
                Ok(())
            }
            "IF" => self.open_if(number()),
            "ELSEIF" => self.else_if(number()),
            "ELSE" => self.else_branch(),
            "ENDIF" => self.end_if(),
            "ENDRANDOM" => self.end_random(),
            _ => return None,
        })
    }

    fn open_if(&mut self, expected: Option<u64>) -> Result<(), ControlFlowWarning> {
        let Some(value) = self.random_value() else {
            return Err(ControlFlowWarning::IfWithoutRandom);
        };
        let parent_active = self.is_active();
        let taken = parent_active && expected == Some(value);
        self.stack.push(Block::If {
            active: taken,
            matched: taken,
            parent_active,
            value,
        });
        Ok(())
    }

    fn else_if(&mut self, expected: Option<u64>) -> Result<(), ControlFlowWarning> {
        let Some(Block::If {
            active,
            matched,
            parent_active,
            value,
        }) = self.stack.last_mut()
        else {
            return Err(ControlFlowWarning::UnmatchedBranch("#ELSEIF".to_owned()));
        };
        let taken = *parent_active && !*matched && expected == Some(*value);
        *active = taken;
        *matched |= taken;
        Ok(())
    }

    fn else_branch(&mut self) -> Result<(), ControlFlowWarning> {
        let Some(Block::If {
            active,
            matched,
            parent_active,
            ..
        }) = self.stack.last_mut()
        else {
            return Err(ControlFlowWarning::UnmatchedBranch("#ELSE".to_owned()));
        };
        *active = *parent_active && !*matched;
        *matched = true;
        Ok(())
    }

    fn end_if(&mut self) -> Result<(), ControlFlowWarning> {
        match self.stack.last() {
            Some(Block::If { .. }) => {
                self.stack.pop();
                Ok(())
            }
            _ => Err(ControlFlowWarning::UnmatchedBranch("#ENDIF".to_owned())),
        }
    }

    fn end_random(&mut self) -> Result<(), ControlFlowWarning> {
        let Some(index) = self
            .stack
            .iter()
            .rposition(|block| matches!(block, Block::Random { .. }))
        else {
            return Err(ControlFlowWarning::UnmatchedEndRandom);
        };
        self.stack.truncate(index);
        Ok(())
    }

    /// Checks that every `#IF` was closed. Unclosed `#RANDOM` blocks are common and accepted.
    pub(crate) fn finish(self) -> Option<ControlFlowWarning> {
        let open_ifs = self
            .stack
            .iter()
            .filter(|block| matches!(block, Block::If { .. }))
            .count();
        (open_ifs > 0).then_some(ControlFlowWarning::Unclosed(open_ifs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::bms::rng::FixedRng;

    fn run(lines: &[(&str, &str)], values: Vec<u64>) -> Vec<bool> {
        let mut flow = ControlFlow::new(FixedRng::new(values));
        lines
            .iter()
            .map(|(command, arg)| {
                let _ = flow.handle(command, arg);
                flow.is_active()
            })
            .collect()
    }

    #[test]
    fn selects_branch_by_random_value() {
        let lines = [
            ("RANDOM", "3"),
            ("IF", "1"),
            ("TITLE", ""),
            ("ELSEIF", "2"),
            ("TITLE", ""),
            ("ELSE", ""),
            ("TITLE", ""),
            ("ENDIF", ""),
            ("ENDRANDOM", ""),
            ("TITLE", ""),
        ];
        let active = run(&lines, vec![2]);
        assert_eq!(
            active,
            vec![true, false, false, true, true, false, false, true, true, true]
        );
    }

    #[test]
    fn nested_random_inside_inactive_branch_is_inactive() {
        let lines = [
            ("RANDOM", "2"),
            ("IF", "2"),
            ("RANDOM", "2"),
            ("IF", "1"),
            ("TITLE", ""),
            ("ENDIF", ""),
            ("ENDRANDOM", ""),
            ("ENDIF", ""),
        ];
        let active = run(&lines, vec![1]);
        assert_eq!(
            active,
            vec![true, false, false, false, false, false, false, true]
        );
    }

    #[test]
    fn stray_endif_warns() {
        let mut flow = ControlFlow::new(FixedRng::new(vec![]));
        assert_eq!(
            flow.handle("ENDIF", ""),
            Some(Err(ControlFlowWarning::UnmatchedBranch("#ENDIF".to_owned())))
        );
        assert_eq!(
            flow.handle("IF", "1"),
            Some(Err(ControlFlowWarning::IfWithoutRandom))
        );
    }
}
