use ratatui::{
    buffer::Buffer,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::Span,
    widgets::{Paragraph, Widget},
};

use crate::focus::FocusShape;
use crate::intent::Intent;
use crate::stimulus::{Placement, StimulusId};

const HORIZONTAL_MARGIN: u16 = 5;
const VERTICAL_MARGIN: u16 = 1;

/// Terminal columns per unit of lateral offset
const COLUMNS_PER_UNIT: f64 = 6.0;

const GLYPHS: [&str; 12] = [
    "▲", "■", "●", "◆", "★", "♣", "♠", "♥", "♦", "✚", "▼", "◐",
];

const POOL_COLORS: [Color; 10] = [
    Color::Cyan,
    Color::Magenta,
    Color::Yellow,
    Color::Green,
    Color::Blue,
    Color::LightRed,
    Color::LightCyan,
    Color::LightMagenta,
    Color::LightYellow,
    Color::LightGreen,
];

pub fn glyph(stimulus: StimulusId) -> &'static str {
    GLYPHS[stimulus.item % GLYPHS.len()]
}

/// What is on screen right now, rebuilt from the intent stream
#[derive(Debug, Clone, Default)]
pub struct Display {
    pub focus_shape: FocusShape,
    pub focus_offset: f64,
    pub focus_scale: f64,
    pub stimuli: Option<(StimulusId, StimulusId, Placement)>,
    pub feedback: Option<bool>,
    pub trials_shown: u32,
}

impl Display {
    pub fn apply(&mut self, intent: &Intent) {
        match intent {
            Intent::PlaceFocus {
                shape,
                offset,
                scale,
            } => {
                self.focus_shape = *shape;
                self.focus_offset = *offset;
                self.focus_scale = *scale;
            }
            Intent::ShowStimuli {
                left,
                right,
                placement,
            } => {
                self.stimuli = Some((*left, *right, *placement));
                self.feedback = None;
                self.trials_shown += 1;
            }
            Intent::HideStimuli => self.stimuli = None,
            Intent::RelocateFocus { offset } => self.focus_offset = *offset,
            Intent::PlayFeedback { correct } => self.feedback = Some(*correct),
        }
    }

    /// Row of the focus target; positive offsets move it up.
    fn focus_row(&self, area: Rect) -> u16 {
        let mid = f64::from(area.y) + f64::from(area.height) / 2.0;
        let row = mid - self.focus_offset * f64::from(area.height);
        row.clamp(f64::from(area.y), f64::from(area.bottom().saturating_sub(1))) as u16
    }

    fn render_field(&self, field: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);
        let row = self.focus_row(field);
        let centre = field.x + field.width / 2;

        let focus_glyph = match self.focus_shape {
            FocusShape::Circle => "○",
            FocusShape::Cross => "+",
        };
        buf.set_string(centre, row, focus_glyph, bold_style);

        if let Some((left, right, placement)) = self.stimuli {
            let columns = (placement.lateral_offset * COLUMNS_PER_UNIT).round() as u16;
            let max_columns = field.width / 2;
            let columns = columns.clamp(1, max_columns.max(1));

            // smaller render scales fade out
            let size_style = if placement.scale >= 0.07 {
                bold_style
            } else if placement.scale <= 0.03 {
                dim_style
            } else {
                Style::default()
            };

            for (stimulus, x) in [
                (left, centre.saturating_sub(columns)),
                (right, (centre + columns).min(field.right().saturating_sub(1))),
            ] {
                let color = POOL_COLORS[usize::from(stimulus.pool.get() - 1) % POOL_COLORS.len()];
                buf.set_string(x, row, glyph(stimulus), size_style.fg(color));
            }
        }
    }
}

impl Widget for &Display {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let bold_style = Style::default().add_modifier(Modifier::BOLD);
        let dim_style = Style::default().add_modifier(Modifier::DIM);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .horizontal_margin(HORIZONTAL_MARGIN)
            .vertical_margin(VERTICAL_MARGIN)
            .constraints([
                Constraint::Length(1), // header
                Constraint::Min(3),    // field
                Constraint::Length(1), // feedback
            ])
            .split(area);

        Paragraph::new(Span::styled(
            format!("trial {}   space = match   esc = stop", self.trials_shown),
            dim_style,
        ))
        .alignment(Alignment::Center)
        .render(chunks[0], buf);

        let field = chunks[1];
        if !field.is_empty() {
            self.render_field(field, buf);
        }

        if let Some(correct) = self.feedback {
            let (text, color) = if correct {
                ("correct", Color::Green)
            } else {
                ("incorrect", Color::Red)
            };
            Paragraph::new(Span::styled(text, bold_style.fg(color)))
                .alignment(Alignment::Center)
                .render(chunks[2], buf);
        }
    }
}
