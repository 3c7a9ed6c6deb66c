//! Plain-text rendering of the active danmaku set.

use crate::danmaku::{DanmakuInstance, Scheduler};
use std::fmt::Write;

/// Render the active instances onto a `width` × `height` character grid.
///
/// Rows map lanes (percent of height) and columns map the horizontal
/// position; text running off either edge is clipped. Later spawns are
/// drawn over earlier ones.
pub fn render_screen(scheduler: &Scheduler, width: usize, height: usize) -> String {
    let mut grid = vec![vec![' '; width]; height];
    let mut instances: Vec<&DanmakuInstance> = scheduler.active().collect();
    instances.sort_by_key(|i| i.id);

    for instance in instances {
        if height == 0 || width == 0 {
            break;
        }
        let row = ((instance.lane / 100.0) * height as f64).floor() as usize;
        let row = row.min(height - 1);
        let col = ((instance.x() / 100.0) * width as f64).round() as i64;
        let label = format!("{} {}", instance.content.emoji, instance.content.display_text());
        for (offset, ch) in label.chars().enumerate() {
            let c = col + offset as i64;
            if c >= 0 && (c as usize) < width {
                grid[row][c as usize] = ch;
            }
        }
    }

    let mut out = String::with_capacity((width + 1) * height);
    for row in grid {
        let line: String = row.into_iter().collect();
        out.push_str(line.trim_end());
        out.push('\n');
    }
    out
}

/// One line per active instance, ordered by id.
pub fn list_active(scheduler: &Scheduler) -> String {
    let mut out = String::new();
    let mut instances: Vec<&DanmakuInstance> = scheduler.active().collect();
    instances.sort_by_key(|i| i.id);
    for i in instances {
        let _ = writeln!(
            out,
            "{:>5} lane {:>5.1}%  x {:>6.1}%  {:>5.1}/{:<5.1}s  {} {}",
            i.id.to_string(),
            i.lane,
            i.x(),
            i.elapsed.as_secs_f64(),
            i.duration.as_secs_f64(),
            i.content.emoji,
            i.content.display_text(),
        );
    }
    out
}
