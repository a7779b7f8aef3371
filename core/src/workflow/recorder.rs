//! Command recording for workflow execution

use crate::error::DeterminismViolationError;
use crate::workflow::command::WorkflowCommand;
use crate::workflow::event::HistoryEvent;
use crate::workflow::validator::DeterminismValidator;

/// Trait for recording workflow commands during execution.
///
/// The n-th recorded command corresponds to the n-th command event of the
/// history, so `command_count()` is the position of the next command.
pub trait CommandRecorder: Send + Sync {
    /// Record a command generated during workflow execution.
    /// Returns an error if the command violates determinism rules.
    fn record_command(&mut self, command: WorkflowCommand)
        -> Result<(), DeterminismViolationError>;

    /// Get all recorded commands
    fn get_commands(&self) -> Vec<WorkflowCommand>;

    /// Take all recorded commands (clears the internal list)
    fn take_commands(&mut self) -> Vec<WorkflowCommand>;

    /// Get the number of recorded commands
    fn command_count(&self) -> usize {
        self.get_commands().len()
    }

    /// Recorded command events no command has been matched against yet
    fn unmatched_events(&self) -> &[HistoryEvent] {
        &[]
    }
}

/// Simple command collector that records commands without validation.
/// Used when determinism validation is disabled.
#[derive(Debug, Default)]
pub struct CommandCollector {
    commands: Vec<WorkflowCommand>,
    cursor: usize,
}

impl CommandCollector {
    /// Create a new command collector
    pub fn new() -> Self {
        Self::default()
    }
}

impl CommandRecorder for CommandCollector {
    fn record_command(
        &mut self,
        command: WorkflowCommand,
    ) -> Result<(), DeterminismViolationError> {
        if command.event_type().is_some() {
            self.cursor += 1;
        }
        self.commands.push(command);
        Ok(())
    }

    fn get_commands(&self) -> Vec<WorkflowCommand> {
        self.commands.clone()
    }

    fn take_commands(&mut self) -> Vec<WorkflowCommand> {
        std::mem::take(&mut self.commands)
    }

    fn command_count(&self) -> usize {
        self.cursor
    }
}

/// Command recorder that validates each command against the recorded
/// command events of a history.
#[derive(Debug)]
pub struct ValidatingCommandRecorder {
    validator: DeterminismValidator,
    command_events: Vec<HistoryEvent>,
    history_closed: bool,
    last_sequence: i32,
    commands: Vec<WorkflowCommand>,
    // Position of the next command; survives take_commands()
    cursor: usize,
}

impl ValidatingCommandRecorder {
    /// Create a new validating command recorder.
    ///
    /// `command_events` are the command-producing events of the history in
    /// sequence order. `last_sequence` is the last sequence number of the
    /// whole history.
    pub fn new(
        validator: DeterminismValidator,
        command_events: Vec<HistoryEvent>,
        history_closed: bool,
        last_sequence: i32,
    ) -> Self {
        Self {
            validator,
            command_events,
            history_closed,
            last_sequence,
            commands: Vec::new(),
            cursor: 0,
        }
    }

    /// Get the command events being validated against
    pub fn command_events(&self) -> &[HistoryEvent] {
        &self.command_events
    }

    /// Validate that every recorded command event has been matched
    pub fn validate_all_consumed(&self) -> Result<(), DeterminismViolationError> {
        self.validator.validate_all_consumed(self.unmatched_events())
    }
}

impl CommandRecorder for ValidatingCommandRecorder {
    fn record_command(
        &mut self,
        command: WorkflowCommand,
    ) -> Result<(), DeterminismViolationError> {
        if command.event_type().is_none() {
            self.commands.push(command);
            return Ok(());
        }

        let recorded = self.command_events.get(self.cursor);
        self.validator.validate_command(
            &command,
            recorded,
            self.history_closed,
            self.last_sequence,
        )?;

        self.cursor += 1;
        self.commands.push(command);
        Ok(())
    }

    fn get_commands(&self) -> Vec<WorkflowCommand> {
        self.commands.clone()
    }

    fn take_commands(&mut self) -> Vec<WorkflowCommand> {
        std::mem::take(&mut self.commands)
    }

    fn command_count(&self) -> usize {
        self.cursor
    }

    fn unmatched_events(&self) -> &[HistoryEvent] {
        self.command_events
            .get(self.cursor..)
            .unwrap_or_default()
    }
}
