use crate::config::{self, Config, MAX_TOTAL_BOXES};
use crate::core::network::{self, SubmitStatus};
use crate::game::controller::{RoundController, RoundEvent};
use crate::game::round::{HitOutcome, RoundRules};
use crate::game::share;
use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEventKind},
    execute, queue,
    style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};
use log::info;
use std::error::Error;
use std::io::{Stdout, Write, stdout};
use std::time::{Duration, Instant};

const FRAME_POLL: Duration = Duration::from_millis(16);

// Flat key list: cell i is hit with CELL_KEYS[i], independent of how many
// columns the grid is drawn with.
const CELL_KEYS: [char; MAX_TOTAL_BOXES] = [
    'q', 'w', 'e', 'r', 't', 'y', 'u', 'i', 'o', 'p', 'a', 's', 'd', 'f', 'g', 'h', 'j', 'k',
    'l', ';',
];

const GRID_ORIGIN_X: u16 = 2;
const GRID_ORIGIN_Y: u16 = 4;
const CELL_STRIDE_X: u16 = 5;
const CELL_STRIDE_Y: u16 = 2;

#[inline(always)]
fn cell_for_key(ch: char, total_boxes: usize) -> Option<usize> {
    let ch = ch.to_ascii_lowercase();
    CELL_KEYS
        .iter()
        .position(|&k| k == ch)
        .filter(|&i| i < total_boxes)
}

pub fn run() -> Result<(), Box<dyn Error>> {
    let rules = RoundRules::from_config(&config::get());
    let mut controller = RoundController::new(rules);

    terminal::enable_raw_mode()?;
    let mut out = stdout();
    execute!(out, terminal::EnterAlternateScreen, cursor::Hide)?;

    let result = main_loop(&mut out, &mut controller);

    // Teardown: no timer may outlive the surface that polls it.
    controller.cancel_timers();
    let _ = execute!(out, cursor::Show, terminal::LeaveAlternateScreen);
    let _ = terminal::disable_raw_mode();
    result
}

fn main_loop(out: &mut Stdout, controller: &mut RoundController) -> Result<(), Box<dyn Error>> {
    let cfg = config::get();
    controller.reset(Instant::now());
    let mut ended_handled = false;
    let mut last_submit_status = network::get_status();
    let mut dirty = true;

    loop {
        if event::poll(FRAME_POLL)? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => match key.code {
                    KeyCode::Esc => break,
                    KeyCode::Enter => {
                        if controller.state().over {
                            controller.reset(Instant::now());
                            ended_handled = false;
                            dirty = true;
                        }
                    }
                    KeyCode::Char(ch) => {
                        if let Some(id) = cell_for_key(ch, controller.rules().total_boxes)
                            && matches!(controller.handle_hit(id), HitOutcome::Scored(_))
                        {
                            dirty = true;
                        }
                    }
                    _ => {}
                },
                Event::Resize(..) => dirty = true,
                _ => {}
            }
        }

        let events = controller.poll(Instant::now());
        if !events.is_empty() {
            dirty = true;
        }
        if !ended_handled && events.contains(&RoundEvent::Ended) {
            ended_handled = true;
            on_round_end(controller);
        }

        // The submission worker updates its status off-thread.
        let submit_status = network::get_status();
        if submit_status != last_submit_status {
            last_submit_status = submit_status;
            dirty = true;
        }

        if dirty {
            draw(out, controller, &cfg)?;
            dirty = false;
        }
    }

    Ok(())
}

fn on_round_end(controller: &RoundController) {
    let Some(summary) = controller.summary() else {
        return;
    };
    info!(
        "round ended: score {}, {}/{} targets",
        summary.score, summary.targets_hit, summary.max_hits
    );
    network::submit_score(&summary);
}

fn draw(
    out: &mut Stdout,
    controller: &RoundController,
    cfg: &Config,
) -> Result<(), Box<dyn Error>> {
    let state = controller.state();
    let rules = controller.rules();
    let columns = cfg.grid_columns.max(1);

    queue!(
        out,
        Clear(ClearType::All),
        cursor::MoveTo(GRID_ORIGIN_X, 0),
        SetAttribute(Attribute::Bold),
        Print("G R I D S H O T"),
        SetAttribute(Attribute::Reset),
        cursor::MoveTo(GRID_ORIGIN_X, 2),
        Print(format!(
            "Score: {:<6} Shots left: {}",
            state.score,
            rules.max_hits - state.attempts
        ))
    )?;

    for cell in &state.cells {
        let col = (cell.id % columns) as u16;
        let row = (cell.id / columns) as u16;
        let x = GRID_ORIGIN_X + col * CELL_STRIDE_X;
        let y = GRID_ORIGIN_Y + row * CELL_STRIDE_Y;

        let (color, bold) = if cell.hit {
            (Color::Green, false)
        } else if cell.active {
            (Color::Yellow, true)
        } else {
            (Color::DarkGrey, false)
        };

        queue!(out, cursor::MoveTo(x, y), SetForegroundColor(color))?;
        if bold {
            queue!(out, SetAttribute(Attribute::Bold))?;
        }
        queue!(
            out,
            Print(format!("[{}]", CELL_KEYS[cell.id])),
            SetAttribute(Attribute::Reset),
            ResetColor
        )?;
    }

    let rows = state.cells.len().div_ceil(columns) as u16;
    let mut y = GRID_ORIGIN_Y + rows * CELL_STRIDE_Y + 1;

    if let Some(summary) = controller.summary() {
        queue!(
            out,
            cursor::MoveTo(GRID_ORIGIN_X, y),
            SetAttribute(Attribute::Bold),
            Print(format!("ROUND OVER - final score {}", summary.score)),
            SetAttribute(Attribute::Reset)
        )?;
        y += 2;
        queue!(
            out,
            cursor::MoveTo(GRID_ORIGIN_X, y),
            Print(share::share_text(&summary))
        )?;
        y += 1;

        if let Some(url) = share::compose_share_url(&summary) {
            queue!(
                out,
                cursor::MoveTo(GRID_ORIGIN_X, y),
                Print(format!("Cast it: {url}"))
            )?;
            y += 1;
            if cfg.share_qr {
                for line in share::share_qr_lines(url.as_str()) {
                    queue!(out, cursor::MoveTo(GRID_ORIGIN_X, y), Print(line))?;
                    y += 1;
                }
            }
        }

        let ledger_line = match network::get_status() {
            SubmitStatus::Idle => None,
            SubmitStatus::Pending => Some("Ledger: submitting...".to_string()),
            SubmitStatus::Accepted(Some(id)) => Some(format!("Ledger: accepted (receipt {id})")),
            SubmitStatus::Accepted(None) => Some("Ledger: accepted".to_string()),
            SubmitStatus::Error(e) => Some(format!("Ledger: {e}")),
        };
        if let Some(line) = ledger_line {
            queue!(out, cursor::MoveTo(GRID_ORIGIN_X, y), Print(line))?;
            y += 1;
        }

        y += 1;
        queue!(
            out,
            cursor::MoveTo(GRID_ORIGIN_X, y),
            Print("ENTER plays again - ESC quits")
        )?;
    } else {
        queue!(
            out,
            cursor::MoveTo(GRID_ORIGIN_X, y),
            Print("Hit the lit key before it goes dark - ESC quits")
        )?;
    }

    out.flush()?;
    Ok(())
}
