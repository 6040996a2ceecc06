//! 终端交互式种子点获取.

use std::io::{self, BufRead, Write};

use log::warn;
use mri_berry::segment::{SeedPicker, SeedPoint};
use mri_berry::{GeometryAttr, MriScan};

/// 最多尝试读取几次输入.
const MAX_ATTEMPTS: usize = 3;

/// 在终端提示用户输入种子点, 阻塞直到读到一行输入.
///
/// 空行, 输入结束或提示无法写出都代表放弃.
#[derive(Debug)]
pub struct StdinSeedPicker<R, W> {
    input: R,
    prompt: W,
}

impl StdinSeedPicker<io::StdinLock<'static>, io::Stdout> {
    pub fn new() -> Self {
        Self::with_io(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> StdinSeedPicker<R, W> {
    pub fn with_io(input: R, prompt: W) -> Self {
        Self { input, prompt }
    }

    fn ask(&mut self, shape: (usize, usize, usize)) -> io::Result<()> {
        let (z, h, w) = shape;
        write!(self.prompt, "tumor seed `z,h,w` within ({z}, {h}, {w}), empty line to abort: ")?;
        self.prompt.flush()
    }
}

impl<R: BufRead, W: Write> SeedPicker for StdinSeedPicker<R, W> {
    fn pick_seed(&mut self, volume: &MriScan) -> Option<SeedPoint> {
        for _ in 0..MAX_ATTEMPTS {
            if let Err(e) = self.ask(volume.shape()) {
                warn!("cannot prompt for a seed: {e}");
                return None;
            }

            let mut line = String::new();
            match self.input.read_line(&mut line) {
                Ok(0) | Err(_) => return None,
                Ok(_) => {}
            }
            let line = line.trim();
            if line.is_empty() {
                return None;
            }
            match line.parse::<SeedPoint>() {
                Ok(seed) if volume.check(&seed.index()) => return Some(seed),
                Ok(seed) => warn!("seed {seed} lies outside the volume"),
                Err(e) => warn!("{e}"),
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mri_berry::Geometry;

    fn scan() -> MriScan {
        MriScan::from_elem(Geometry::unit((4, 5, 6)), 0.0)
    }

    fn picker(input: &str) -> StdinSeedPicker<&[u8], io::Sink> {
        StdinSeedPicker::with_io(input.as_bytes(), io::sink())
    }

    struct BrokenPipe;

    impl Write for BrokenPipe {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::ErrorKind::BrokenPipe.into())
        }

        fn flush(&mut self) -> io::Result<()> {
            Err(io::ErrorKind::BrokenPipe.into())
        }
    }

    #[test]
    fn test_reads_seed() {
        let mut p = picker("1,2,3\n");
        assert_eq!(p.pick_seed(&scan()), Some(SeedPoint::new(1, 2, 3)));
    }

    #[test]
    fn test_retries_then_gives_up() {
        let mut p = picker("x\n9,9,9\n3,4,5\n");
        assert_eq!(p.pick_seed(&scan()), Some(SeedPoint::new(3, 4, 5)));

        let mut p = picker("x\ny\nz\n1,1,1\n");
        assert_eq!(p.pick_seed(&scan()), None);

        let mut p = picker("\n");
        assert_eq!(p.pick_seed(&scan()), None);
    }

    #[test]
    fn test_gives_up_when_prompt_fails() {
        let mut p = StdinSeedPicker::with_io("1,2,3\n".as_bytes(), BrokenPipe);
        assert_eq!(p.pick_seed(&scan()), None);
    }
}
