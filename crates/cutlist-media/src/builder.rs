//! Render plan → FFmpeg filter graph.
//!
//! Input layout: `0` is the source video, `1..=N` the audio clips in
//! request order, `N + 1` the overlay image when one is present.

use std::path::Path;

use cutlist_models::{AudioClip, BlurRegion, RenderRequest, VideoSegment};
use tracing::debug;

use crate::config::RenderConfig;
use crate::graph::{FilterGraph, FilterNode, GraphError, Pad};
use crate::subtitles::escape_filter_path;
use crate::tempo::atempo_chain;
use crate::units::{db_to_linear_gain, format_gain, percent_box_to_pixels, seconds_to_delay_ms, PixelRect};

/// Final video label of a complex graph.
pub const VIDEO_OUTPUT: &str = "vout";
/// Final audio label of a complex graph.
pub const AUDIO_OUTPUT: &str = "aout";

const BLUR_FILTER: &str = "boxblur=luma_radius=20:luma_power=3";

/// Everything the builder needs to know about one render.
#[derive(Debug, Clone, Copy)]
pub struct GraphPlan<'a> {
    pub segments: &'a [VideoSegment],
    pub clips: &'a [AudioClip],
    pub blur: Option<&'a BlurRegion>,
    pub has_overlay: bool,
    /// Path of the compiled subtitle document, when there are cues
    pub subtitle_path: Option<&'a Path>,
    pub master_volume_db: f64,
    /// Whether the source carries an audio stream
    pub source_has_audio: bool,
}

impl<'a> GraphPlan<'a> {
    /// Plan for a validated request.
    pub fn from_request(
        request: &'a RenderRequest,
        subtitle_path: Option<&'a Path>,
        source_has_audio: bool,
    ) -> Self {
        Self {
            segments: &request.video_segments,
            clips: &request.audio_files,
            blur: request.active_blur_region(),
            has_overlay: request.overlay_base64().is_some(),
            subtitle_path,
            master_volume_db: request.master_volume_db,
            source_has_audio,
        }
    }

    /// Number of `-i` inputs the command will carry.
    pub fn input_count(&self) -> usize {
        1 + self.clips.len() + usize::from(self.has_overlay)
    }

    /// Input index of the overlay image.
    pub fn overlay_input(&self) -> Option<usize> {
        self.has_overlay.then(|| 1 + self.clips.len())
    }

    fn blur_rect(&self, config: &RenderConfig) -> Option<PixelRect> {
        self.blur
            .filter(|region| region.enabled)
            .map(|region| percent_box_to_pixels(region, config.canvas_width, config.canvas_height))
            .filter(|rect| !rect.is_empty())
    }

    fn needs_audio_chain(&self) -> bool {
        !self.clips.is_empty() || !self.segments.is_empty() || self.master_volume_db != 0.0
    }
}

/// Output of the builder.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledGraph {
    /// A single video chain applied with `-vf`; source audio passes through.
    Simple { filters: Vec<String> },
    /// A full `-filter_complex` graph.
    Complex {
        graph: FilterGraph,
        /// `Some(AUDIO_OUTPUT)` when an audio branch was built
        audio_output: Option<&'static str>,
    },
}

impl CompiledGraph {
    pub fn is_simple(&self) -> bool {
        matches!(self, CompiledGraph::Simple { .. })
    }

    pub fn has_audio_branch(&self) -> bool {
        matches!(
            self,
            CompiledGraph::Complex {
                audio_output: Some(_),
                ..
            }
        )
    }

    /// The `-vf` or `-filter_complex` argument value.
    pub fn filter_arg(&self) -> Result<String, GraphError> {
        match self {
            CompiledGraph::Simple { filters } => Ok(filters.join(",")),
            CompiledGraph::Complex {
                graph,
                audio_output,
            } => {
                let mut terminals = vec![VIDEO_OUTPUT];
                terminals.extend(audio_output.iter().copied());
                graph.serialize(&terminals)
            }
        }
    }
}

/// Build the filter graph for a render.
pub fn build_graph(plan: &GraphPlan<'_>, config: &RenderConfig) -> Result<CompiledGraph, GraphError> {
    let blur_rect = plan.blur_rect(config);

    let simple = plan.segments.is_empty()
        && plan.clips.is_empty()
        && blur_rect.is_none()
        && !plan.has_overlay
        && plan.master_volume_db == 0.0;

    if simple {
        let mut filters = normalization_filters(config);
        if let Some(path) = plan.subtitle_path {
            filters.push(subtitle_filter(path));
        }
        debug!(filters = filters.len(), "Built simple video chain");
        return Ok(CompiledGraph::Simple { filters });
    }

    let mut graph = FilterGraph::new(plan.input_count());
    build_video(&mut graph, plan, config, blur_rect);
    let audio_output = build_audio(&mut graph, plan);

    let compiled = CompiledGraph::Complex {
        graph,
        audio_output,
    };
    // Closure is a builder invariant; check it before handing the graph out.
    compiled.filter_arg()?;
    if let CompiledGraph::Complex { graph, .. } = &compiled {
        debug!(
            nodes = graph.nodes().len(),
            inputs = graph.input_count(),
            audio = audio_output.is_some(),
            "Built filter graph"
        );
    }
    Ok(compiled)
}

fn normalization_filters(config: &RenderConfig) -> Vec<String> {
    let (w, h) = (config.canvas_width, config.canvas_height);
    vec![
        format!("scale={}:{}:force_original_aspect_ratio=decrease", w, h),
        format!("pad={}:{}:(ow-iw)/2:(oh-ih)/2", w, h),
        format!("fps={}", config.frame_rate),
    ]
}

fn subtitle_filter(path: &Path) -> String {
    format!("ass='{}'", escape_filter_path(path))
}

fn build_video(graph: &mut FilterGraph, plan: &GraphPlan<'_>, config: &RenderConfig, blur: Option<PixelRect>) {
    // Segments
    let mut current = Pad::video(0);
    if !plan.segments.is_empty() {
        let mut labels = Vec::with_capacity(plan.segments.len());
        for (i, segment) in plan.segments.iter().enumerate() {
            let label = format!("seg{}v", i);
            graph.push(FilterNode::chain(
                Pad::video(0),
                vec![
                    format!(
                        "trim=start={}:end={}",
                        segment.source_start_time, segment.source_end_time
                    ),
                    format!("setpts=(PTS-STARTPTS)/{}", segment.playback_rate),
                ],
                label.clone(),
            ));
            labels.push(label);
        }
        current = if labels.len() > 1 {
            let n = labels.len();
            graph.push(FilterNode::new(
                labels.into_iter().map(Pad::Label).collect(),
                vec![format!("concat=n={}:v=1:a=0", n)],
                vec!["vcat".to_string()],
            ));
            Pad::label("vcat")
        } else {
            Pad::label(labels.remove(0))
        };
    }

    graph.push(FilterNode::chain(current, normalization_filters(config), "vnorm"));
    let mut last = "vnorm".to_string();

    if let Some(rect) = blur {
        graph.push(FilterNode::new(
            vec![Pad::label(last.as_str())],
            vec!["split=2".to_string()],
            vec!["vbase".to_string(), "vblursrc".to_string()],
        ));
        graph.push(FilterNode::chain(
            Pad::label("vblursrc"),
            vec![
                format!("crop={}:{}:{}:{}", rect.width, rect.height, rect.x, rect.y),
                BLUR_FILTER.to_string(),
            ],
            "vblurred",
        ));
        graph.push(FilterNode::new(
            vec![Pad::label("vbase"), Pad::label("vblurred")],
            vec![format!("overlay={}:{}", rect.x, rect.y)],
            vec!["vblur".to_string()],
        ));
        last = "vblur".to_string();
    }

    if let Some(index) = plan.overlay_input() {
        graph.push(FilterNode::chain(
            Pad::video(index),
            vec![format!("scale={}:{}", config.canvas_width, config.canvas_height)],
            "ovlimg",
        ));
        graph.push(FilterNode::new(
            vec![Pad::label(last.as_str()), Pad::label("ovlimg")],
            vec!["overlay=0:0".to_string()],
            vec!["vovl".to_string()],
        ));
        last = "vovl".to_string();
    }

    // Burn-in goes last so nothing covers the text.
    if let Some(path) = plan.subtitle_path {
        graph.push(FilterNode::chain(
            Pad::label(last.as_str()),
            vec![subtitle_filter(path)],
            "vsub",
        ));
        last = "vsub".to_string();
    }

    graph.relabel_output(&last, VIDEO_OUTPUT);
}

fn build_audio(graph: &mut FilterGraph, plan: &GraphPlan<'_>) -> Option<&'static str> {
    if !plan.needs_audio_chain() {
        return None;
    }

    let mut contributors: Vec<Pad> = Vec::new();

    if plan.source_has_audio {
        if plan.segments.is_empty() {
            contributors.push(Pad::audio(0));
        } else {
            let mut labels = Vec::with_capacity(plan.segments.len());
            for (i, segment) in plan.segments.iter().enumerate() {
                let label = format!("seg{}a", i);
                let mut filters = vec![
                    format!(
                        "atrim=start={}:end={}",
                        segment.source_start_time, segment.source_end_time
                    ),
                    "asetpts=PTS-STARTPTS".to_string(),
                ];
                filters.extend(atempo_chain(segment.playback_rate));
                graph.push(FilterNode::chain(Pad::audio(0), filters, label.clone()));
                labels.push(label);
            }
            if labels.len() > 1 {
                let n = labels.len();
                graph.push(FilterNode::new(
                    labels.into_iter().map(Pad::Label).collect(),
                    vec![format!("concat=n={}:v=0:a=1", n)],
                    vec!["acat".to_string()],
                ));
                contributors.push(Pad::label("acat"));
            } else {
                contributors.extend(labels.into_iter().map(Pad::Label));
            }
        }
    }

    for (i, clip) in plan.clips.iter().enumerate() {
        let mut filters = Vec::with_capacity(2);
        if let Some(db) = clip.volume_db.filter(|db| *db != 0.0) {
            filters.push(format!("volume={}", format_gain(db_to_linear_gain(db))));
        }
        let ms = seconds_to_delay_ms(clip.start_time);
        filters.push(format!("adelay={}|{}", ms, ms));

        let label = format!("clip{}", i);
        graph.push(FilterNode::chain(Pad::audio(i + 1), filters, label.clone()));
        contributors.push(Pad::Label(label));
    }

    if contributors.is_empty() {
        return None;
    }

    let mixed = if contributors.len() > 1 {
        let n = contributors.len();
        graph.push(FilterNode::new(
            contributors,
            vec![format!("amix=inputs={}:duration=longest:normalize=0", n)],
            vec!["amixed".to_string()],
        ));
        Pad::label("amixed")
    } else {
        contributors.remove(0)
    };

    if plan.master_volume_db != 0.0 {
        graph.push(FilterNode::chain(
            mixed,
            vec![format!("volume={}", format_gain(db_to_linear_gain(plan.master_volume_db)))],
            AUDIO_OUTPUT,
        ));
    } else {
        match mixed {
            Pad::Label(label) => {
                graph.relabel_output(&label, AUDIO_OUTPUT);
            }
            input => graph.push(FilterNode::chain(input, vec!["anull".to_string()], AUDIO_OUTPUT)),
        }
    }

    Some(AUDIO_OUTPUT)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn plan<'a>(segments: &'a [VideoSegment], clips: &'a [AudioClip]) -> GraphPlan<'a> {
        GraphPlan {
            segments,
            clips,
            blur: None,
            has_overlay: false,
            subtitle_path: None,
            master_volume_db: 0.0,
            source_has_audio: true,
        }
    }

    fn complex_arg(compiled: &CompiledGraph) -> String {
        assert!(!compiled.is_simple());
        compiled.filter_arg().unwrap()
    }

    fn graph_of(compiled: &CompiledGraph) -> &FilterGraph {
        match compiled {
            CompiledGraph::Complex { graph, .. } => graph,
            CompiledGraph::Simple { .. } => panic!("expected complex graph"),
        }
    }

    #[test]
    fn test_empty_request_takes_simple_path() {
        let config = RenderConfig::default();
        let compiled = build_graph(&plan(&[], &[]), &config).unwrap();

        assert!(compiled.is_simple());
        assert!(!compiled.has_audio_branch());
        assert_eq!(
            compiled.filter_arg().unwrap(),
            "scale=1920:1080:force_original_aspect_ratio=decrease,pad=1920:1080:(ow-iw)/2:(oh-ih)/2,fps=30"
        );
    }

    #[test]
    fn test_simple_path_appends_subtitles() {
        let config = RenderConfig::default();
        let path = PathBuf::from("/tmp/render/subtitles.ass");
        let mut p = plan(&[], &[]);
        p.subtitle_path = Some(&path);

        let compiled = build_graph(&p, &config).unwrap();
        let arg = compiled.filter_arg().unwrap();
        assert!(arg.ends_with(",fps=30,ass='/tmp/render/subtitles.ass'"));
    }

    #[test]
    fn test_single_segment_has_no_concat() {
        let config = RenderConfig::default();
        let segments = [VideoSegment::new(2.0, 7.5, 1.0)];
        let compiled = build_graph(&plan(&segments, &[]), &config).unwrap();
        let graph = graph_of(&compiled);

        assert_eq!(graph.count_filter("trim"), 1);
        assert_eq!(graph.count_filter("concat"), 0);
        assert_eq!(graph.count_filter("atrim"), 1);
        assert_eq!(graph.count_filter("atempo"), 0);

        let arg = complex_arg(&compiled);
        assert!(arg.starts_with("[0:v]trim=start=2:end=7.5,setpts=(PTS-STARTPTS)/1[seg0v];[seg0v]scale="));
        assert!(arg.contains("[0:a]atrim=start=2:end=7.5,asetpts=PTS-STARTPTS[aout]"));
    }

    #[test]
    fn test_two_segments_with_slow_second() {
        let config = RenderConfig::default();
        let segments = [VideoSegment::new(0.0, 5.0, 1.0), VideoSegment::new(10.0, 12.0, 0.5)];
        let compiled = build_graph(&plan(&segments, &[]), &config).unwrap();
        let graph = graph_of(&compiled);

        assert_eq!(graph.count_filter("trim"), 2);
        let concat: Vec<_> = graph
            .nodes()
            .iter()
            .filter(|n| n.uses_filter("concat"))
            .map(ToString::to_string)
            .collect();
        assert_eq!(
            concat,
            vec![
                "[seg0v][seg1v]concat=n=2:v=1:a=0[vcat]",
                "[seg0a][seg1a]concat=n=2:v=0:a=1[aout]"
            ]
        );

        let arg = complex_arg(&compiled);
        assert!(arg.contains("[0:a]atrim=start=0:end=5,asetpts=PTS-STARTPTS[seg0a]"));
        assert!(arg.contains("[0:a]atrim=start=10:end=12,asetpts=PTS-STARTPTS,atempo=0.5[seg1a]"));
        assert!(arg.contains("setpts=(PTS-STARTPTS)/0.5[seg1v]"));
    }

    #[test]
    fn test_segments_keep_list_order() {
        let config = RenderConfig::default();
        let segments = [
            VideoSegment::new(30.0, 31.0, 1.0),
            VideoSegment::new(0.0, 1.0, 1.0),
            VideoSegment::new(15.0, 16.0, 1.0),
        ];
        let arg = complex_arg(&build_graph(&plan(&segments, &[]), &config).unwrap());

        let first = arg.find("trim=start=30").unwrap();
        let second = arg.find("trim=start=0:").unwrap();
        let third = arg.find("trim=start=15").unwrap();
        assert!(first < second && second < third);
        assert!(arg.contains("[seg0v][seg1v][seg2v]concat=n=3:v=1:a=0[vcat]"));
    }

    #[test]
    fn test_audio_clip_gain_and_delay() {
        let config = RenderConfig::default();
        let clips = [AudioClip::new("music", 3.2).with_volume_db(-6.0)];
        let compiled = build_graph(&plan(&[], &clips), &config).unwrap();

        let arg = complex_arg(&compiled);
        assert!(arg.contains("[1:a]volume=0.501187,adelay=3200|3200[clip0]"));
        assert!(arg.contains("[0:a][clip0]amix=inputs=2:duration=longest:normalize=0[aout]"));
        assert!(compiled.has_audio_branch());
    }

    #[test]
    fn test_clip_without_source_audio() {
        let config = RenderConfig::default();
        let clips = [AudioClip::new("vo", 0.0)];
        let mut p = plan(&[], &clips);
        p.source_has_audio = false;

        let arg = complex_arg(&build_graph(&p, &config).unwrap());
        assert!(arg.contains("[1:a]adelay=0|0[aout]"));
        assert!(!arg.contains("amix"));
        assert!(!arg.contains("[0:a]"));
    }

    #[test]
    fn test_master_gain_applied_last() {
        let config = RenderConfig::default();
        let clips = [AudioClip::new("a", 1.0), AudioClip::new("b", 2.5)];
        let mut p = plan(&[], &clips);
        p.master_volume_db = 6.0;

        let arg = complex_arg(&build_graph(&p, &config).unwrap());
        assert!(arg.contains("[0:a][clip0][clip1]amix=inputs=3:duration=longest:normalize=0[amixed]"));
        assert!(arg.ends_with("[amixed]volume=1.995262[aout]"));
    }

    #[test]
    fn test_master_gain_alone_builds_audio_branch() {
        let config = RenderConfig::default();
        let mut p = plan(&[], &[]);
        p.master_volume_db = -20.0;

        let compiled = build_graph(&p, &config).unwrap();
        let arg = complex_arg(&compiled);
        assert!(arg.contains("[0:a]volume=0.100000[aout]"));
    }

    #[test]
    fn test_segments_without_source_audio_skip_audio_branch() {
        let config = RenderConfig::default();
        let segments = [VideoSegment::new(0.0, 1.0, 2.0)];
        let mut p = plan(&segments, &[]);
        p.source_has_audio = false;

        let compiled = build_graph(&p, &config).unwrap();
        assert!(!compiled.has_audio_branch());
        assert_eq!(graph_of(&compiled).count_filter("atrim"), 0);
    }

    #[test]
    fn test_blur_region_pipeline() {
        let config = RenderConfig::default();
        let region = BlurRegion::new(10.0, 80.0, 80.0, 15.0);
        let mut p = plan(&[], &[]);
        p.blur = Some(&region);

        let compiled = build_graph(&p, &config).unwrap();
        assert!(!compiled.has_audio_branch());
        let arg = complex_arg(&compiled);
        assert!(arg.contains("[vnorm]split=2[vbase][vblursrc]"));
        assert!(arg.contains(
            "[vblursrc]crop=1536:162:192:864,boxblur=luma_radius=20:luma_power=3[vblurred]"
        ));
        assert!(arg.ends_with("[vbase][vblurred]overlay=192:864[vout]"));
    }

    #[test]
    fn test_blur_region_past_right_edge_is_clipped() {
        let config = RenderConfig::default();
        let region = BlurRegion::new(90.0, 50.0, 50.0, 20.0);
        let mut p = plan(&[], &[]);
        p.blur = Some(&region);

        let arg = complex_arg(&build_graph(&p, &config).unwrap());
        assert!(arg.contains("[vblursrc]crop=192:216:1728:540,"));
        assert!(arg.ends_with("[vbase][vblurred]overlay=1728:540[vout]"));
    }

    #[test]
    fn test_disabled_or_empty_blur_is_skipped() {
        let config = RenderConfig::default();
        let mut disabled = BlurRegion::new(10.0, 10.0, 50.0, 50.0);
        disabled.enabled = false;
        let mut p = plan(&[], &[]);
        p.blur = Some(&disabled);
        assert!(build_graph(&p, &config).unwrap().is_simple());

        let empty = BlurRegion::new(10.0, 10.0, 0.0, 50.0);
        p.blur = Some(&empty);
        assert!(build_graph(&p, &config).unwrap().is_simple());
    }

    #[test]
    fn test_overlay_follows_clips_and_subtitles_are_last() {
        let config = RenderConfig::default();
        let clips = [AudioClip::new("a", 0.5)];
        let region = BlurRegion::new(10.0, 10.0, 50.0, 50.0);
        let path = PathBuf::from("/tmp/r/subtitles.ass");
        let mut p = plan(&[], &clips);
        p.blur = Some(&region);
        p.has_overlay = true;
        p.subtitle_path = Some(&path);

        assert_eq!(p.input_count(), 3);
        let compiled = build_graph(&p, &config).unwrap();
        let arg = complex_arg(&compiled);

        assert!(arg.contains("[2:v]scale=1920:1080[ovlimg]"));
        assert!(arg.contains("[vblur][ovlimg]overlay=0:0[vovl]"));
        assert!(arg.contains("[vovl]ass='/tmp/r/subtitles.ass'[vout]"));

        let blur_at = arg.find("boxblur").unwrap();
        let overlay_at = arg.find("overlay=0:0").unwrap();
        let ass_at = arg.find("ass=").unwrap();
        assert!(blur_at < overlay_at && overlay_at < ass_at);
    }

    #[test]
    fn test_custom_canvas() {
        let config = RenderConfig {
            canvas_width: 1280,
            canvas_height: 720,
            frame_rate: 25,
            ..Default::default()
        };
        let arg = build_graph(&plan(&[], &[]), &config).unwrap().filter_arg().unwrap();
        assert!(arg.starts_with("scale=1280:720:"));
        assert!(arg.ends_with("fps=25"));
    }
}
