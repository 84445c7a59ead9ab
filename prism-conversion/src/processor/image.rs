//! Image processor
//!
//! Implements the image operation set with ImageMagick (`identify`,
//! `convert`) and `exiftool`. The argument vectors built here are what
//! existing deployments expect, so they must stay exactly as they are.

use async_trait::async_trait;
use prism_core::domain::image::{DEFAULT_DPI, EncodedThumbnail, ImageDimensions, ResizeSpec};
use prism_core::dto::pipeline::Operation;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::Processor;
use super::encode::file_to_base64;
use crate::error::{ProcessorError, Result};
use crate::files::{TempFile, extension_of};
use crate::identifier::FileType;
use crate::invoker::ToolInvoker;

/// Bounds for base64 previews
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageLimits {
    pub preview_max_width: u32,
    pub preview_max_height: u32,
}

impl Default for ImageLimits {
    fn default() -> Self {
        Self {
            preview_max_width: 512,
            preview_max_height: 512,
        }
    }
}

/// Program names (or paths) of the external tools
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageTools {
    pub identify: String,
    pub convert: String,
    pub exiftool: String,
}

impl Default for ImageTools {
    fn default() -> Self {
        Self {
            identify: "identify".to_string(),
            convert: "convert".to_string(),
            exiftool: "exiftool".to_string(),
        }
    }
}

/// Processor for raster and vector images
pub struct ImageProcessor {
    invoker: Arc<dyn ToolInvoker>,
    limits: ImageLimits,
    tools: ImageTools,
    /// Directory for scratch files, e.g. the resized copy behind a preview
    temp_dir: PathBuf,
}

impl ImageProcessor {
    pub fn new(
        invoker: Arc<dyn ToolInvoker>,
        limits: ImageLimits,
        tools: ImageTools,
        temp_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            invoker,
            limits,
            tools,
            temp_dir: temp_dir.into(),
        }
    }

    async fn encode(&self, path: &Path, size: ImageDimensions) -> Result<EncodedThumbnail> {
        Ok(EncodedThumbnail {
            data: file_to_base64(path).await?,
            width: size.width,
            height: size.height,
        })
    }
}

#[async_trait]
impl Processor for ImageProcessor {
    fn file_type(&self) -> FileType {
        FileType::Image
    }

    fn default_operations(&self) -> Vec<Operation> {
        vec![
            Operation::Measure,
            Operation::ExtractDpi,
            Operation::Base64Thumbnail,
        ]
    }

    async fn measure(&self, input: &Path, cancel: &CancellationToken) -> Result<ImageDimensions> {
        let args = vec!["-format".to_string(), "%w,%h".to_string(), path_arg(input)];
        let output = self.invoker.run(&self.tools.identify, &args, cancel).await?;
        parse_dimensions(&output).map_err(|reason| {
            ProcessorError::parse(&self.tools.identify, output.as_str(), reason)
        })
    }

    async fn resize(
        &self,
        input: &Path,
        spec: ResizeSpec,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let args = vec![
            "-resize".to_string(),
            spec.geometry(),
            path_arg(input),
            path_arg(output),
        ];
        self.invoker.execute(&self.tools.convert, &args, cancel).await?;
        Ok(())
    }

    async fn thumbnail(
        &self,
        input: &Path,
        spec: ResizeSpec,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let args = vec![
            "-thumbnail".to_string(),
            spec.geometry(),
            "-background".to_string(),
            "white".to_string(),
            "-alpha".to_string(),
            "remove".to_string(),
            "-flatten".to_string(),
            format!("{}[0]", path_arg(input)),
            path_arg(output),
        ];
        self.invoker.execute(&self.tools.convert, &args, cancel).await?;
        Ok(())
    }

    async fn base64_thumbnail(
        &self,
        input: &Path,
        cancel: &CancellationToken,
    ) -> Result<EncodedThumbnail> {
        let size = self.measure(input, cancel).await?;
        let ImageLimits {
            preview_max_width,
            preview_max_height,
        } = self.limits;

        if !size.exceeds(preview_max_width, preview_max_height) {
            debug!(
                "{} is {}x{}, within preview bounds",
                input.display(),
                size.width,
                size.height
            );
            return self.encode(input, size).await;
        }

        let spec = preview_spec(size, self.limits);
        info!(
            "Downscaling {} from {}x{} to {} for preview",
            input.display(),
            size.width,
            size.height,
            spec.geometry()
        );

        let temp = TempFile::new(&self.temp_dir, &extension_of(input));
        self.resize(input, spec, temp.path(), cancel).await?;
        let resized = self.measure(temp.path(), cancel).await?;
        self.encode(temp.path(), resized).await
    }

    async fn convert(&self, input: &Path, output: &Path, cancel: &CancellationToken) -> Result<()> {
        let args = vec![path_arg(input), path_arg(output)];
        self.invoker.execute(&self.tools.convert, &args, cancel).await?;
        Ok(())
    }

    async fn remove_alpha_channel(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let args = vec![
            path_arg(input),
            "-alpha".to_string(),
            "off".to_string(),
            path_arg(output),
        ];
        self.invoker.execute(&self.tools.convert, &args, cancel).await?;
        Ok(())
    }

    async fn extract_dpi(&self, input: &Path, cancel: &CancellationToken) -> Result<u32> {
        let args = vec![
            "-S".to_string(),
            "-s".to_string(),
            "-ImageWidth".to_string(),
            "-ImageHeight".to_string(),
            "-XResolution".to_string(),
            "-YResolution".to_string(),
            "-ResolutionUnit".to_string(),
            path_arg(input),
        ];
        let output = self.invoker.run(&self.tools.exiftool, &args, cancel).await?;
        parse_dpi(&output)
            .map_err(|reason| ProcessorError::parse(&self.tools.exiftool, output.as_str(), reason))
    }
}

/// Geometry that brings `size` within `limits`
///
/// Landscape sources are scaled by width, everything else by height. When
/// that side would leave the other one over its bound (non-square limits),
/// the other side drives the resize instead.
fn preview_spec(size: ImageDimensions, limits: ImageLimits) -> ResizeSpec {
    let max_width = limits.preview_max_width;
    let max_height = limits.preview_max_height;

    if size.is_landscape() {
        if scale_side(size.height, max_width, size.width) <= max_height {
            ResizeSpec::by_width(max_width)
        } else {
            ResizeSpec::by_height(max_height)
        }
    } else if scale_side(size.width, max_height, size.height) <= max_width {
        ResizeSpec::by_height(max_height)
    } else {
        ResizeSpec::by_width(max_width)
    }
}

/// `side` after scaling `from` to `to`, rounded like ImageMagick
fn scale_side(side: u32, to: u32, from: u32) -> u32 {
    (side as f64 * to as f64 / from as f64).round() as u32
}

fn path_arg(path: &Path) -> String {
    path.to_string_lossy().to_string()
}

/// Parses `identify -format %w,%h` output
///
/// Each field is stripped of anything that is not a digit before parsing,
/// since some formats decorate the numbers.
fn parse_dimensions(output: &str) -> std::result::Result<ImageDimensions, String> {
    let mut fields = output.split(',');
    let width = parse_side(fields.next(), "width")?;
    let height = parse_side(fields.next(), "height")?;
    Ok(ImageDimensions::new(width, height))
}

fn parse_side(field: Option<&str>, name: &str) -> std::result::Result<u32, String> {
    let field = field.ok_or_else(|| format!("missing {}", name))?;
    let digits: String = field.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.parse::<u32>() {
        Ok(0) => Err(format!("{} is zero", name)),
        Ok(value) => Ok(value),
        Err(e) => Err(format!("invalid {} '{}': {}", name, field.trim(), e)),
    }
}

/// Derives DPI from exiftool's five-line answer
///
/// Lines are width, height, X resolution, Y resolution, resolution unit.
/// Anything other than a full answer in inches yields [`DEFAULT_DPI`].
fn parse_dpi(output: &str) -> std::result::Result<u32, String> {
    let lines: Vec<&str> = output.lines().map(str::trim).collect();
    if lines.len() < 5 || lines[4] != "inches" {
        return Ok(DEFAULT_DPI);
    }

    let x_res = parse_resolution(lines[2], "x resolution")?;
    let y_res = parse_resolution(lines[3], "y resolution")?;

    Ok(((x_res + y_res) / 2.0) as u32)
}

fn parse_resolution(line: &str, name: &str) -> std::result::Result<f64, String> {
    match line.parse::<f64>() {
        Ok(value) if value.is_finite() && value >= 0.0 => Ok(value),
        Ok(value) => Err(format!("{} out of range: {}", name, value)),
        Err(e) => Err(format!("invalid {} '{}': {}", name, line, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeMagick;
    use base64::{Engine as _, engine::general_purpose::STANDARD};

    fn processor(fake: &Arc<FakeMagick>, dir: &Path, limits: ImageLimits) -> ImageProcessor {
        ImageProcessor::new(fake.clone(), limits, ImageTools::default(), dir)
    }

    fn limits(max: u32) -> ImageLimits {
        ImageLimits {
            preview_max_width: max,
            preview_max_height: max,
        }
    }

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("640,480"), Ok(ImageDimensions::new(640, 480)));
        assert_eq!(
            parse_dimensions("640px, 480px\n"),
            Ok(ImageDimensions::new(640, 480))
        );
    }

    #[test]
    fn test_parse_dimensions_rejects_partial_output() {
        assert!(parse_dimensions("640").is_err());
        assert!(parse_dimensions(",480").is_err());
        assert!(parse_dimensions("").is_err());
        assert!(parse_dimensions("abc,def").is_err());
        assert!(parse_dimensions("0,480").is_err());
        assert!(parse_dimensions("99999999999,1").is_err());
    }

    #[test]
    fn test_parse_dpi_averages_inches() {
        assert_eq!(parse_dpi("4000\n3000\n300\n300\ninches\n"), Ok(300));
        assert_eq!(parse_dpi("10\n10\n72\n73\ninches"), Ok(72));
        assert_eq!(parse_dpi("10\n10\n96\n100\ninches\r\n"), Ok(98));
    }

    #[test]
    fn test_parse_dpi_falls_back() {
        // Unit line missing
        assert_eq!(parse_dpi("4000\n3000\n300\n300\n"), Ok(DEFAULT_DPI));
        // Not inches
        assert_eq!(parse_dpi("4000\n3000\n118\n118\ncm\n"), Ok(DEFAULT_DPI));
        assert_eq!(parse_dpi("4000\n3000\n1\n1\nNone\n"), Ok(DEFAULT_DPI));
        assert_eq!(parse_dpi(""), Ok(DEFAULT_DPI));
    }

    #[test]
    fn test_parse_dpi_rejects_garbage_resolution() {
        assert!(parse_dpi("1\n1\nhigh\n300\ninches\n").is_err());
        assert!(parse_dpi("1\n1\n300\ninf\ninches\n").is_err());
    }

    #[tokio::test]
    async fn test_measure_invokes_identify() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "photo.png", 640, 480);
        let processor = processor(&fake, dir.path(), limits(1024));

        let size = processor
            .measure(&source, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(size, ImageDimensions::new(640, 480));

        let calls = fake.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "identify");
        assert_eq!(
            calls[0].args,
            vec!["-format".to_string(), "%w,%h".to_string(), path_arg(&source)]
        );
    }

    #[tokio::test]
    async fn test_measure_is_deterministic() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "photo.png", 1234, 567);
        let processor = processor(&fake, dir.path(), limits(1024));
        let cancel = CancellationToken::new();

        let first = processor.measure(&source, &cancel).await.unwrap();
        let second = processor.measure(&source, &cancel).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_measure_unparsable_output() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        fake.respond("identify", "garbage");
        let processor = processor(&fake, dir.path(), limits(1024));

        let err = processor
            .measure(&dir.path().join("x.png"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::MeasurementParse { .. }));
    }

    #[tokio::test]
    async fn test_resize_by_width_preserves_aspect_ratio() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "photo.jpg", 3000, 2000);
        let output = dir.path().join("out.jpg");
        let processor = processor(&fake, dir.path(), limits(1024));
        let cancel = CancellationToken::new();

        processor
            .resize(&source, ResizeSpec::by_width(600), &output, &cancel)
            .await
            .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].program, "convert");
        assert_eq!(
            calls[0].args,
            vec![
                "-resize".to_string(),
                "600x".to_string(),
                path_arg(&source),
                path_arg(&output)
            ]
        );

        let size = processor.measure(&output, &cancel).await.unwrap();
        assert_eq!(size.width, 600);
        assert!((size.height as i64 - 400).abs() <= 1);
    }

    #[tokio::test]
    async fn test_thumbnail_flattens_first_frame() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "anim.gif", 500, 500);
        let output = dir.path().join("thumb.gif");
        let processor = processor(&fake, dir.path(), limits(1024));

        processor
            .thumbnail(
                &source,
                ResizeSpec::by_height(100),
                &output,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            fake.calls()[0].args,
            vec![
                "-thumbnail".to_string(),
                "x100".to_string(),
                "-background".to_string(),
                "white".to_string(),
                "-alpha".to_string(),
                "remove".to_string(),
                "-flatten".to_string(),
                format!("{}[0]", path_arg(&source)),
                path_arg(&output),
            ]
        );
        assert!(output.exists());
    }

    #[tokio::test]
    async fn test_convert_and_remove_alpha_arguments() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "logo.png", 300, 200);
        let converted = dir.path().join("logo.jpg");
        let opaque = dir.path().join("opaque.png");
        let processor = processor(&fake, dir.path(), limits(1024));
        let cancel = CancellationToken::new();

        processor.convert(&source, &converted, &cancel).await.unwrap();
        processor
            .remove_alpha_channel(&source, &opaque, &cancel)
            .await
            .unwrap();

        let calls = fake.calls();
        assert_eq!(calls[0].args, vec![path_arg(&source), path_arg(&converted)]);
        assert_eq!(
            calls[1].args,
            vec![
                path_arg(&source),
                "-alpha".to_string(),
                "off".to_string(),
                path_arg(&opaque)
            ]
        );

        // Conversion keeps geometry
        assert_eq!(
            processor.measure(&converted, &cancel).await.unwrap(),
            processor.measure(&source, &cancel).await.unwrap()
        );
    }

    #[tokio::test]
    async fn test_base64_thumbnail_downscales_landscape_by_width() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "wide.png", 4000, 2000);
        let scratch = tempfile::tempdir().unwrap();
        let processor = processor(&fake, scratch.path(), limits(1024));

        let thumb = processor
            .base64_thumbnail(&source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(thumb.width, 1024);
        assert_eq!(thumb.height, 512);
        assert_eq!(
            STANDARD.decode(&thumb.data).unwrap(),
            FakeMagick::contents(1024, 512)
        );

        let resizes = fake.calls_with_flag("-resize");
        assert_eq!(resizes.len(), 1);
        assert_eq!(resizes[0].args[1], "1024x");

        // The resized copy lives in the scratch dir and is gone afterwards
        assert!(resizes[0].args[3].starts_with(&path_arg(scratch.path())));
        assert!(resizes[0].args[3].ends_with(".png"));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_base64_thumbnail_downscales_portrait_by_height() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "tall.jpg", 1000, 3000);
        let processor = processor(
            &fake,
            dir.path(),
            ImageLimits {
                preview_max_width: 800,
                preview_max_height: 600,
            },
        );

        let thumb = processor
            .base64_thumbnail(&source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fake.calls_with_flag("-resize")[0].args[1], "x600");
        assert_eq!(thumb.height, 600);
        assert_eq!(thumb.width, 200);
        assert!(thumb.width <= 800);
    }

    #[tokio::test]
    async fn test_base64_thumbnail_square_is_driven_by_height() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "square.png", 2000, 2000);
        let processor = processor(&fake, dir.path(), limits(500));

        let thumb = processor
            .base64_thumbnail(&source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fake.calls_with_flag("-resize")[0].args[1], "x500");
        assert_eq!((thumb.width, thumb.height), (500, 500));
    }

    #[test]
    fn test_preview_spec_respects_both_bounds() {
        let limits = ImageLimits {
            preview_max_width: 800,
            preview_max_height: 600,
        };
        // Width would fit but leave 720 rows, so height drives
        assert_eq!(
            preview_spec(ImageDimensions::new(1000, 900), limits),
            ResizeSpec::by_height(600)
        );
        assert_eq!(
            preview_spec(ImageDimensions::new(4000, 2000), limits),
            ResizeSpec::by_width(800)
        );

        let narrow = ImageLimits {
            preview_max_width: 200,
            preview_max_height: 800,
        };
        assert_eq!(
            preview_spec(ImageDimensions::new(500, 1000), narrow),
            ResizeSpec::by_width(200)
        );
        assert_eq!(
            preview_spec(ImageDimensions::new(100, 1600), narrow),
            ResizeSpec::by_height(800)
        );
    }

    #[tokio::test]
    async fn test_base64_thumbnail_fits_non_square_limits() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "photo.png", 1000, 900);
        let processor = processor(
            &fake,
            dir.path(),
            ImageLimits {
                preview_max_width: 800,
                preview_max_height: 600,
            },
        );

        let thumb = processor
            .base64_thumbnail(&source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(fake.calls_with_flag("-resize")[0].args[1], "x600");
        assert_eq!((thumb.width, thumb.height), (667, 600));
    }

    #[tokio::test]
    async fn test_base64_thumbnail_small_image_is_not_resized() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "icon.png", 300, 200);
        let processor = processor(&fake, dir.path(), limits(1024));

        let thumb = processor
            .base64_thumbnail(&source, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!((thumb.width, thumb.height), (300, 200));
        assert_eq!(
            STANDARD.decode(&thumb.data).unwrap(),
            FakeMagick::contents(300, 200)
        );
        assert!(fake.calls_to("convert").is_empty());
        assert_eq!(fake.calls_to("identify").len(), 1);
    }

    #[tokio::test]
    async fn test_base64_thumbnail_removes_temp_file_on_failure() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "huge.png", 9000, 3000);
        fake.fail_with_flag("-resize");
        let scratch = tempfile::tempdir().unwrap();
        let processor = processor(&fake, scratch.path(), limits(1024));

        let err = processor
            .base64_thumbnail(&source, &CancellationToken::new())
            .await
            .unwrap_err();

        assert!(matches!(err, ProcessorError::ToolExecution(_)));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_base64_thumbnail_cancelled_mid_resize_removes_temp_file() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "huge.png", 9000, 3000);
        fake.hang("convert");
        let scratch = tempfile::tempdir().unwrap();
        let processor = processor(&fake, scratch.path(), limits(1024));
        let cancel = CancellationToken::new();

        let (result, _) = tokio::join!(processor.base64_thumbnail(&source, &cancel), async {
            while fake.calls_with_flag("-resize").is_empty() {
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
            // The partially written copy exists while convert runs
            assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 1);
            cancel.cancel();
        });

        assert!(matches!(result, Err(ProcessorError::Cancelled)));
        assert_eq!(std::fs::read_dir(scratch.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_extract_dpi_requests_five_fields() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "scan.tiff", 2480, 3508);
        fake.respond("exiftool", "2480\n3508\n300\n300\ninches\n");
        let processor = processor(&fake, dir.path(), limits(1024));

        let dpi = processor
            .extract_dpi(&source, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(dpi, 300);

        let mut expected = strings(&[
            "-S",
            "-s",
            "-ImageWidth",
            "-ImageHeight",
            "-XResolution",
            "-YResolution",
            "-ResolutionUnit",
        ]);
        expected.push(path_arg(&source));
        assert_eq!(fake.calls_to("exiftool")[0].args, expected);
    }

    #[tokio::test]
    async fn test_extract_dpi_four_lines_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let source = fake.add_image(dir.path(), "photo.png", 10, 10);
        fake.respond("exiftool", "10\n10\n300\n300\n");
        let processor = processor(&fake, dir.path(), limits(1024));

        let dpi = processor
            .extract_dpi(&source, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(dpi, 72);
    }

    #[tokio::test]
    async fn test_tool_failure_surfaces_as_tool_execution() {
        let dir = tempfile::tempdir().unwrap();
        let fake = Arc::new(FakeMagick::new());
        let processor = processor(&fake, dir.path(), limits(1024));

        // FakeMagick fails identify for unknown files, like the real tool
        let err = processor
            .measure(&dir.path().join("missing.png"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ProcessorError::ToolExecution(_)));
    }
}
