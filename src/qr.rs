//! Pluggable scannable-code encoding.  The core only needs "string in,
//! image-like artifact out"; the QR implementation is one provider of that
//! capability, and decoding belongs to the second device entirely.

use qrcode::{Color, QrCode};

/// A square grid of dark/light modules, independent of any rendering target.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct CodeArtifact {
    width: usize,
    modules: Vec<bool>,
}

impl CodeArtifact {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn module(&self, x: usize, y: usize) -> bool {
        x < self.width && y < self.width && self.modules[y * self.width + x]
    }

    /// Renders the code with Unicode half-blocks, two module rows per text
    /// line, surrounded by the four-module quiet zone the QR spec asks for.
    /// Inverted so dark terminals keep scannable contrast.
    pub fn to_terminal_string(&self) -> String {
        const QUIET: usize = 4;
        let total = self.width + QUIET * 2;
        let dark_at = |x: usize, y: usize| match (x.checked_sub(QUIET), y.checked_sub(QUIET)) {
            (Some(x), Some(y)) => self.module(x, y),
            _ => false,
        };
        let mut out = String::new();
        for y in (0..total).step_by(2) {
            for x in 0..total {
                let top = dark_at(x, y);
                let bottom = y + 1 < total && dark_at(x, y + 1);
                out.push(match (top, bottom) {
                    (false, false) => '█',
                    (false, true) => '▀',
                    (true, false) => '▄',
                    (true, true) => ' ',
                });
            }
            out.push('\n');
        }
        out
    }
}

pub trait CodeEncoder {
    fn encode(&self, data: &str) -> anyhow::Result<CodeArtifact>;
}

pub struct QrEncoder;

impl CodeEncoder for QrEncoder {
    fn encode(&self, data: &str) -> anyhow::Result<CodeArtifact> {
        let code = QrCode::new(data)?;
        let width = code.width();
        let modules = code
            .to_colors()
            .into_iter()
            .map(|color| color == Color::Dark)
            .collect();
        Ok(CodeArtifact { width, modules })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encodes_identifier_into_square_grid() {
        let artifact = QrEncoder
            .encode("0f8fad5b-d9cb-469f-a165-70867728950e")
            .unwrap();
        assert!(artifact.width() >= 21); // smallest QR version
        assert_eq!(artifact.modules.len(), artifact.width() * artifact.width());
        // The top-left finder pattern corner is always dark.
        assert!(artifact.module(0, 0));
    }

    #[test]
    fn terminal_rendering_covers_quiet_zone() {
        let artifact = QrEncoder.encode("abc").unwrap();
        let rendered = artifact.to_terminal_string();
        let lines: Vec<_> = rendered.lines().collect();
        let total = artifact.width() + 8;
        assert_eq!(lines.len(), total.div_ceil(2));
        assert!(lines.iter().all(|line| line.chars().count() == total));
        // Quiet zone renders as light (full block) in the inverted scheme.
        assert!(lines[0].chars().all(|c| c == '█'));
    }
}
