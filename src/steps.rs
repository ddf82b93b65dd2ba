//! Step progress track
//!
//! The daily step count is shown as a horizontal line that grows from the left
//! edge of a fixed-width track towards the goal. Two short ticks mark how far
//! the user usually is at this time of day and by the end of the day.

use heapless::Vec;

/// Map `steps` onto a track of `track_width` pixels where `goal` fills the
/// whole track. Counts above the goal stay on the track.
pub fn steps_to_offset(steps: u32, track_width: u32, goal: u32) -> u32 {
    if goal == 0 {
        return track_width;
    }
    // Round half up without floating point
    let offset = (steps as u64 * track_width as u64 + goal as u64 / 2) / goal as u64;
    offset.min(track_width as u64) as u32
}

/// Colour role of a track segment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackColor {
    /// Full-width background track
    Base,
    /// Steps below the goal
    Progress,
    /// Goal exceeded
    Success,
}

/// Primitive of the step track, positions relative to the track start
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DrawCommand {
    /// Horizontal line from 0 to `to`
    Track { to: u32, color: TrackColor },
    /// Pace marker at `x`
    Tick { x: u32 },
    /// Congratulation text with the exact step count
    GoalReached { steps: u32 },
}

/// Commands of one track render
pub type DrawCommands = Vec<DrawCommand, 4>;

/// Step counts a track render is based on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepProgress {
    /// Steps taken today
    pub current: u32,
    /// Steps usually taken by now
    pub average_now: u32,
    /// Steps usually taken by the end of the day
    pub average_eod: u32,
}

/// Turns step counts into track draw commands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepProgressRenderer {
    goal: u32,
    track_width: u32,
}

impl StepProgressRenderer {
    pub fn new(goal: u32, track_width: u32) -> Self {
        Self { goal, track_width }
    }

    pub fn goal(&self) -> u32 {
        self.goal
    }

    pub fn track_width(&self) -> u32 {
        self.track_width
    }

    fn offset(&self, steps: u32) -> u32 {
        steps_to_offset(steps, self.track_width, self.goal)
    }

    /// Base track, the progress overlay and either the pace ticks or the goal
    /// label once the goal is exceeded
    pub fn render(&self, progress: &StepProgress) -> DrawCommands {
        let mut commands = DrawCommands::new();
        let reached = progress.current > self.goal;

        // At most four commands are ever pushed
        let _ = commands.push(DrawCommand::Track {
            to: self.track_width,
            color: TrackColor::Base,
        });
        let _ = commands.push(DrawCommand::Track {
            to: self.offset(progress.current),
            color: if reached {
                TrackColor::Success
            } else {
                TrackColor::Progress
            },
        });

        if reached {
            let _ = commands.push(DrawCommand::GoalReached {
                steps: progress.current,
            });
            return commands;
        }

        let now = self.offset(progress.average_now);
        if now < self.track_width {
            let _ = commands.push(DrawCommand::Tick { x: now });
        }
        let eod = self.offset(progress.average_eod);
        if eod > now && eod < self.track_width {
            let _ = commands.push(DrawCommand::Tick { x: eod });
        }

        commands
    }
}
