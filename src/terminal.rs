use anyhow::Result;
use crossterm::{
    style::{style, Attribute, Color, PrintStyledContent, Stylize},
    QueueableCommand,
};

use std::io::{stdout, Write};

use connect4_engine::{Position, Side, HEIGHT, WIDTH};

/// Draws the board with column numbers on top, top row first
pub fn display(position: &Position) -> Result<()> {
    let mut stdout = stdout();

    let cols: String = (1..=WIDTH).map(|x| x.to_string()).collect();
    stdout.queue(PrintStyledContent(style(cols + "\n")))?;

    for row in 0..HEIGHT {
        for column in 0..WIDTH {
            stdout.queue(PrintStyledContent(
                style("O")
                    .attribute(Attribute::Bold)
                    .on(Color::DarkBlue)
                    .with(match position.cell(row, column) {
                        Some(Side::One) => Color::Red,
                        Some(Side::Two) => Color::Yellow,
                        None => Color::DarkBlue,
                    }),
            ))?;
        }
        stdout.queue(PrintStyledContent(style("\n")))?;
    }
    stdout.flush()?;
    Ok(())
}
