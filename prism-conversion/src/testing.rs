//! Test doubles for the tool invoker and the result reporter

use async_trait::async_trait;
use prism_core::domain::image::{ImageDimensions, ResizeSpec};
use prism_core::domain::report::PipelineReport;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::invoker::{ToolError, ToolInvoker};
use crate::reporter::ResultReporter;

/// One recorded invocation
#[derive(Debug, Clone)]
pub struct Call {
    pub program: String,
    pub args: Vec<String>,
}

/// In-memory stand-in for ImageMagick and exiftool
///
/// Tracks the geometry of every file it knows about. `convert` writes real
/// output files (their contents encode the geometry) so code reading them
/// back behaves as it would against the real tools.
#[derive(Default)]
pub struct FakeMagick {
    images: Mutex<HashMap<PathBuf, ImageDimensions>>,
    responses: Mutex<HashMap<String, String>>,
    failing_flags: Mutex<HashSet<String>>,
    hanging: Mutex<HashSet<String>>,
    calls: Mutex<Vec<Call>>,
}

impl FakeMagick {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bytes the fake writes for an image of the given size
    pub fn contents(width: u32, height: u32) -> Vec<u8> {
        format!("fake-image {}x{}", width, height).into_bytes()
    }

    /// Creates a source image file in `dir`
    pub fn add_image(&self, dir: &Path, name: &str, width: u32, height: u32) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, Self::contents(width, height)).unwrap();
        self.images
            .lock()
            .unwrap()
            .insert(path.clone(), ImageDimensions::new(width, height));
        path
    }

    /// Fixes the stdout of every call to `program`
    pub fn respond(&self, program: &str, output: &str) {
        self.responses
            .lock()
            .unwrap()
            .insert(program.to_string(), output.to_string());
    }

    /// Makes every call containing `flag` exit nonzero
    pub fn fail_with_flag(&self, flag: &str) {
        self.failing_flags.lock().unwrap().insert(flag.to_string());
    }

    /// Makes calls to `program` block until cancelled
    ///
    /// A hanging `convert` leaves a partial output file behind.
    pub fn hang(&self, program: &str) {
        self.hanging.lock().unwrap().insert(program.to_string());
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn calls_to(&self, program: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }

    pub fn calls_with_flag(&self, flag: &str) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.args.iter().any(|a| a == flag))
            .collect()
    }

    fn exit(program: &str, args: &[String], stderr: &str) -> ToolError {
        ToolError::Exit {
            program: program.to_string(),
            args: args.to_vec(),
            code: Some(1),
            stdout: String::new(),
            stderr: stderr.to_string(),
        }
    }

    fn identify(&self, args: &[String]) -> Result<String, ToolError> {
        let path = PathBuf::from(args.last().cloned().unwrap_or_default());
        match self.images.lock().unwrap().get(&path) {
            Some(size) => Ok(format!("{},{}", size.width, size.height)),
            None => Err(Self::exit("identify", args, "unable to open image")),
        }
    }

    fn convert(&self, args: &[String]) -> Result<String, ToolError> {
        let (input, spec) = match args.first().map(String::as_str) {
            Some("-resize") => (args[2].clone(), ResizeSpec::parse_geometry(&args[1])),
            Some("-thumbnail") => (
                args[7].trim_end_matches("[0]").to_string(),
                ResizeSpec::parse_geometry(&args[1]),
            ),
            _ => (args[0].clone(), None),
        };
        let output = PathBuf::from(args.last().cloned().unwrap_or_default());

        let source = self
            .images
            .lock()
            .unwrap()
            .get(Path::new(&input))
            .copied()
            .ok_or_else(|| Self::exit("convert", args, "unable to open image"))?;

        let size = match spec {
            Some(spec) => scale(source, spec),
            None => source,
        };

        std::fs::write(&output, Self::contents(size.width, size.height))
            .map_err(|_| Self::exit("convert", args, "unable to write output"))?;
        self.images.lock().unwrap().insert(output, size);
        Ok(String::new())
    }
}

/// Geometry ImageMagick produces for `spec`, preserving the aspect ratio
fn scale(source: ImageDimensions, spec: ResizeSpec) -> ImageDimensions {
    let (sw, sh) = (source.width as f64, source.height as f64);
    let factor = match (spec.width, spec.height) {
        (0, 0) => 1.0,
        (w, 0) => w as f64 / sw,
        (0, h) => h as f64 / sh,
        (w, h) => (w as f64 / sw).min(h as f64 / sh),
    };
    ImageDimensions::new(
        ((sw * factor).round() as u32).max(1),
        ((sh * factor).round() as u32).max(1),
    )
}

#[async_trait]
impl ToolInvoker for FakeMagick {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cancel: &CancellationToken,
    ) -> Result<String, ToolError> {
        self.calls.lock().unwrap().push(Call {
            program: program.to_string(),
            args: args.to_vec(),
        });

        if cancel.is_cancelled() {
            return Err(ToolError::Cancelled {
                program: program.to_string(),
            });
        }

        let hangs = self.hanging.lock().unwrap().contains(program);
        if hangs {
            // A hung convert has already started writing its output
            if program == "convert"
                && let Some(output) = args.last()
            {
                std::fs::write(output, b"partial").unwrap();
            }
            cancel.cancelled().await;
            return Err(ToolError::Cancelled {
                program: program.to_string(),
            });
        }

        let fails = {
            let flags = self.failing_flags.lock().unwrap();
            args.iter().any(|a| flags.contains(a))
        };
        if fails {
            return Err(Self::exit(program, args, "scripted failure"));
        }

        if let Some(output) = self.responses.lock().unwrap().get(program) {
            return Ok(output.clone());
        }

        match program {
            "identify" => self.identify(args),
            "convert" => self.convert(args),
            "exiftool" => Ok(String::new()),
            other => Err(ToolError::Spawn {
                program: other.to_string(),
                args: args.to_vec(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not installed"),
            }),
        }
    }
}

/// Forwards every report into a channel
pub struct ChannelReporter {
    sender: mpsc::UnboundedSender<PipelineReport>,
}

impl ChannelReporter {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PipelineReport>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, receiver)
    }
}

#[async_trait]
impl ResultReporter for ChannelReporter {
    async fn report(&self, report: &PipelineReport) -> anyhow::Result<()> {
        self.sender.send(report.clone())?;
        Ok(())
    }
}
