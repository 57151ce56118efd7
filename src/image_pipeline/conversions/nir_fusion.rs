use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{info, info_span, instrument};

use crate::image_pipeline::{
    common::error::{FusionError, Result},
    common::timing::{PipelineTimings, Timer},
    conversions::config::PipelineConfig,
    merging::{DetailFusionMerger, FusedImage},
    raster::RasterImage,
    registration::{FeatureRegistrar, RegisteredPair},
    shadow::{ShadowDetector, ShadowMask},
    tiff::{RasterReader, RasterWriter, StandardTiffReader, StandardTiffWriter},
};

pub const RGB_REGISTERED_FILE: &str = "rgb_registered.tiff";
pub const NIR_REGISTERED_FILE: &str = "nir_registered.tiff";
pub const FUSED_FILE: &str = "fused.tiff";
pub const SHADOW_MASK_FILE: &str = "shadow_mask.tiff";

/// Everything one pipeline run produced.
#[derive(Debug, Clone)]
pub struct PipelineOutput {
    pub pair: RegisteredPair,
    pub fused: Option<FusedImage>,
    pub shadow: Option<ShadowMask>,
    pub timings: PipelineTimings,
}

struct Stages {
    registrar: FeatureRegistrar,
    merger: DetailFusionMerger,
    shadow: ShadowDetector,
}

impl Stages {
    fn build(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            registrar: FeatureRegistrar::new(config.registration.clone())?,
            merger: DetailFusionMerger::new(config.merge)?,
            shadow: ShadowDetector::new(config.shadow)?,
        })
    }
}

/// Decode, register, fuse and detect shadows for one RGB/NIR capture.
pub struct NirFusionPipeline<R: RasterReader, W: RasterWriter> {
    reader: R,
    writer: W,
    config: PipelineConfig,
    stages: Stages,
}

impl NirFusionPipeline<StandardTiffReader, StandardTiffWriter> {
    pub fn new(config: PipelineConfig) -> Result<Self> {
        Self::with_custom(StandardTiffReader, StandardTiffWriter, config)
    }
}

impl<R: RasterReader, W: RasterWriter> NirFusionPipeline<R, W> {
    pub fn with_custom(reader: R, writer: W, config: PipelineConfig) -> Result<Self> {
        let stages = Stages::build(&config)?;
        Ok(Self {
            reader,
            writer,
            config,
            stages,
        })
    }

    /// Runs the configured stages on already-decoded rasters.
    ///
    /// Registration failure is returned before any downstream stage runs.
    #[instrument(skip_all, fields(mode = %self.config.mode))]
    pub fn process_images(&self, rgb: &RasterImage, nir: &RasterImage) -> Result<PipelineOutput> {
        let mut timings = PipelineTimings::new();

        let pair = timings.measure("register", || {
            if self.config.assume_aligned {
                RegisteredPair::new(rgb.clone(), nir.clone())
            } else {
                self.stages.registrar.register(rgb, nir)
            }
        })?;

        let (mode, stages) = (self.config.mode, &self.stages);
        let merge = || -> Option<(Result<FusedImage>, PipelineTimings)> {
            mode.runs_merge().then(|| {
                let mut t = PipelineTimings::new();
                let fused = t.measure("merge", || stages.merger.merge(&pair));
                (fused, t)
            })
        };
        let shadow = || -> Option<(Result<ShadowMask>, PipelineTimings)> {
            mode.runs_shadow().then(|| {
                let mut t = PipelineTimings::new();
                let mask = t.measure("shadow", || stages.shadow.detect(&pair));
                (mask, t)
            })
        };
        let (merged, shadowed) = rayon::join(merge, shadow);

        let fused = match merged {
            Some((fused, t)) => {
                timings.merge(t);
                Some(fused?)
            }
            None => None,
        };
        let shadow = match shadowed {
            Some((mask, t)) => {
                timings.merge(t);
                Some(mask?)
            }
            None => None,
        };

        info!(
            matches = pair.match_count(),
            inliers = pair.inlier_count(),
            fused = fused.is_some(),
            shadow = shadow.is_some(),
            "Pipeline complete"
        );
        Ok(PipelineOutput {
            pair,
            fused,
            shadow,
            timings,
        })
    }

    /// Decodes both inputs and runs the configured stages.
    #[instrument(skip_all, fields(rgb_size = rgb_data.len(), nir_size = nir_data.len()))]
    pub fn process(&self, rgb_data: &[u8], nir_data: &[u8]) -> Result<PipelineOutput> {
        let mut decode_timings = PipelineTimings::new();
        let (rgb, nir) = decode_timings.measure("decode", || {
            let _span = info_span!("decode_inputs").entered();
            Ok::<_, FusionError>((
                self.reader.read_raster(rgb_data)?,
                self.reader.read_raster(nir_data)?,
            ))
        })?;

        let mut output = self.process_images(&rgb, &nir)?;
        decode_timings.merge(output.timings);
        output.timings = decode_timings;
        Ok(output)
    }

    /// Encodes every raster in `output` to its sink, in a fixed order:
    /// registered RGB, registered NIR, fused image, shadow mask.
    pub fn write_outputs(
        &self,
        output: &PipelineOutput,
        mut sink: impl FnMut(&str) -> Result<Box<dyn Write>>,
    ) -> Result<()> {
        let _span = info_span!("encode_outputs").entered();
        let mut write = |name: &str, image: &RasterImage| -> Result<()> {
            let mut target = sink(name)?;
            self.writer.write_raster(image, target.as_mut(), &self.config.output)?;
            target.flush()?;
            Ok(())
        };

        write(RGB_REGISTERED_FILE, output.pair.rgb())?;
        write(NIR_REGISTERED_FILE, output.pair.nir())?;
        if let Some(fused) = &output.fused {
            write(FUSED_FILE, fused.image())?;
        }
        if let Some(shadow) = &output.shadow {
            if self.config.output.scale_mask {
                let visible = RasterImage::new(
                    shadow.mask().width(),
                    shadow.mask().height(),
                    1,
                    shadow.mask().sample_type(),
                    shadow.mask().data().iter().map(|v| v * 255.0).collect(),
                )?;
                write(SHADOW_MASK_FILE, &visible)?;
            } else {
                write(SHADOW_MASK_FILE, shadow.mask())?;
            }
        }
        Ok(())
    }

    /// Reads two image files, processes them and writes the results into
    /// `output_dir`, returning the paths written.
    #[instrument(skip(self, rgb_path, nir_path, output_dir))]
    pub fn process_files<P: AsRef<Path>, Q: AsRef<Path>, O: AsRef<Path>>(
        &self,
        rgb_path: P,
        nir_path: Q,
        output_dir: O,
    ) -> Result<(PipelineOutput, Vec<PathBuf>)> {
        let (rgb_path, nir_path, output_dir) =
            (rgb_path.as_ref(), nir_path.as_ref(), output_dir.as_ref());
        info!(
            rgb = %rgb_path.display(),
            nir = %nir_path.display(),
            output = %output_dir.display(),
            "Processing files"
        );

        let read = |path: &Path| {
            let _span = info_span!("read_input_file").entered();
            std::fs::read(path)
                .map_err(|e| FusionError::InputReadError(format!("{}: {}", path.display(), e)))
        };
        let rgb_data = read(rgb_path)?;
        let nir_data = read(nir_path)?;

        let mut output = self.process(&rgb_data, &nir_data)?;

        std::fs::create_dir_all(output_dir).map_err(|e| {
            FusionError::OutputWriteError(format!("{}: {}", output_dir.display(), e))
        })?;
        let mut written = Vec::new();
        let encode_timer = Timer::start("encode");
        self.write_outputs(&output, |name| {
            let path = output_dir.join(name);
            let file = std::fs::File::create(&path).map_err(|e| {
                FusionError::OutputWriteError(format!("{}: {}", path.display(), e))
            })?;
            written.push(path);
            let sink: Box<dyn Write> = Box::new(std::io::BufWriter::new(file));
            Ok(sink)
        })?;
        let (name, duration) = encode_timer.stop();
        output.timings.add_step(name, duration);

        Ok((output, written))
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Replaces the configuration; the previous one stays in effect if the
    /// new one is invalid.
    pub fn set_config(&mut self, config: PipelineConfig) -> Result<()> {
        self.stages = Stages::build(&config)?;
        self.config = config;
        Ok(())
    }
}
