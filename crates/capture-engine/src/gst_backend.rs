//! GStreamer capture and encoder backends.
//!
//! Capture pipelines end in an `appsink` that converts frames to RGBA (or
//! samples to interleaved F32LE) for the compositor and recorder. The encoder
//! runs `appsrc → vp9enc/opusenc → webmmux → appsink` and hands the muxed
//! WebM bytes back incrementally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::time::Duration;

use async_trait::async_trait;
use clipmix_common::{ClipmixError, ClipmixResult};
use clipmix_platform_core::{
    detect_display_server, AudioBlock, AudioFeed, CameraRequest, CaptureBackend, DisplayRequest,
    DisplayServer, EndSignal, FrameSize, Source, SourceKind, VideoFeed, VideoFrame,
};
use gst::prelude::*;
use gstreamer as gst;
use gstreamer_app as gst_app;
use image::imageops::{self, FilterType};
use image::RgbaImage;
use tokio::sync::watch;

use crate::encoder::{
    EncoderBackend, EncoderParams, IncrementalEncoder, MIME_VP9, MIME_VP9_OPUS, MIME_WEBM,
};

const AUDIO_RATE: u32 = 48_000;
const AUDIO_CHANNELS: u16 = 2;
/// Upper bound on buffered microphone samples (two seconds).
const MAX_PENDING_SAMPLES: usize = (AUDIO_RATE as usize) * (AUDIO_CHANNELS as usize) * 2;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

pub fn init_gstreamer() -> ClipmixResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    let init_res = GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string()));
    match init_res {
        Ok(()) => Ok(()),
        Err(e) => Err(ClipmixError::capture(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

fn launch_pipeline(name: &str, launch: &str) -> ClipmixResult<gst::Pipeline> {
    init_gstreamer()?;
    tracing::debug!(pipeline = name, launch, "Building pipeline");

    let element = gst::parse::launch(launch).map_err(|e| {
        ClipmixError::capture(format!("Failed to build {name} pipeline: {e}"))
    })?;
    element
        .dynamic_cast::<gst::Pipeline>()
        .map_err(|_| ClipmixError::capture("Launch string did not produce a pipeline"))
}

fn named<T: IsA<gst::Element>>(pipeline: &gst::Pipeline, name: &str) -> ClipmixResult<T> {
    pipeline
        .by_name(name)
        .and_then(|element| element.downcast::<T>().ok())
        .ok_or_else(|| ClipmixError::capture(format!("Pipeline element '{name}' missing")))
}

/// Map a pipeline error message onto the capture error taxonomy.
fn classify_error(what: &str, error: &gst::glib::Error) -> ClipmixError {
    match error.kind::<gst::ResourceError>() {
        Some(gst::ResourceError::NotAuthorized) => {
            ClipmixError::permission_denied(format!("Access to the {what} was denied: {error}"))
        }
        Some(gst::ResourceError::NotFound | gst::ResourceError::OpenRead | gst::ResourceError::OpenReadWrite) => {
            ClipmixError::device_not_found(format!("No usable {what}: {error}"))
        }
        _ => ClipmixError::capture(format!("{what} capture failed: {error}")),
    }
}

/// Bring a capture pipeline to Playing, surfacing the first bus error.
fn start_capture(pipeline: &gst::Pipeline, what: &str) -> ClipmixResult<()> {
    let state_change = pipeline.set_state(gst::State::Playing);
    let settled = pipeline.state(gst::ClockTime::from_seconds(10));

    let failed = state_change.is_err() || settled.0.is_err();
    if !failed {
        if settled.1 != gst::State::Playing {
            tracing::warn!(pipeline = what, state = ?settled.1, "Pipeline did not reach Playing state within timeout");
        }
        return Ok(());
    }

    let error = pipeline.bus().and_then(|bus| {
        bus.timed_pop_filtered(gst::ClockTime::ZERO, &[gst::MessageType::Error])
    });
    let _ = pipeline.set_state(gst::State::Null);
    match error.as_ref().map(|msg| msg.view()) {
        Some(gst::MessageView::Error(e)) => Err(classify_error(what, &e.error())),
        _ => Err(ClipmixError::capture(format!(
            "{what} pipeline failed to reach Playing state"
        ))),
    }
}

/// Fire `end` when the pipeline posts EOS or an error. Exits once `end` fires.
fn watch_bus(pipeline: &gst::Pipeline, label: String, end: EndSignal) {
    let Some(bus) = pipeline.bus() else {
        return;
    };
    std::thread::spawn(move || {
        while !end.is_fired() {
            let Some(msg) = bus.timed_pop(gst::ClockTime::from_mseconds(100)) else {
                continue;
            };
            match msg.view() {
                gst::MessageView::Eos(_) => {
                    tracing::info!(feed = %label, "Capture track ended");
                    end.fire();
                }
                gst::MessageView::Error(e) => {
                    tracing::warn!(feed = %label, error = %e.error(), "Capture track failed");
                    end.fire();
                }
                _ => {}
            }
        }
    });
}

#[derive(Default)]
struct VideoSlot {
    frame: Option<Arc<VideoFrame>>,
    size: Option<FrameSize>,
    sequence: u64,
}

/// A GStreamer video source decoded to RGBA.
pub struct GstVideoFeed {
    label: String,
    pipeline: gst::Pipeline,
    slot: Arc<Mutex<VideoSlot>>,
    frame_rate: u32,
    stopped: AtomicBool,
    end: EndSignal,
}

impl GstVideoFeed {
    fn open(
        label: &str,
        source: &str,
        frame_rate: u32,
        size: Option<FrameSize>,
        what: &str,
    ) -> ClipmixResult<Arc<Self>> {
        let size_caps = size
            .map(|s| format!(",width={},height={}", s.width, s.height))
            .unwrap_or_default();
        let launch = format!(
            "{source} ! queue max-size-buffers=4 leaky=downstream ! videoconvert ! videoscale ! videorate ! video/x-raw,format=RGBA,framerate={frame_rate}/1{size_caps} ! appsink name=sink max-buffers=1 drop=true sync=false"
        );
        let pipeline = launch_pipeline(label, &launch)?;
        let sink: gst_app::AppSink = named(&pipeline, "sink")?;

        let slot = Arc::new(Mutex::new(VideoSlot::default()));
        let writer = Arc::clone(&slot);
        sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let structure = sample
                        .caps()
                        .and_then(|caps| caps.structure(0))
                        .ok_or(gst::FlowError::NotNegotiated)?;
                    let width = structure.get::<i32>("width").map_err(|_| gst::FlowError::NotNegotiated)? as u32;
                    let height = structure.get::<i32>("height").map_err(|_| gst::FlowError::NotNegotiated)? as u32;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let pts = buffer.pts().map(|t| t.nseconds()).unwrap_or(0);
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    let len = (width as usize) * (height as usize) * 4;
                    let Some(pixels) = map.as_slice().get(..len) else {
                        return Err(gst::FlowError::Error);
                    };
                    let Some(image) = RgbaImage::from_raw(width, height, pixels.to_vec()) else {
                        return Err(gst::FlowError::Error);
                    };

                    let mut slot = lock(&writer);
                    let sequence = slot.sequence;
                    slot.sequence += 1;
                    slot.size = Some(FrameSize::new(width, height));
                    slot.frame = Some(Arc::new(VideoFrame::new(image, pts, sequence)));
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        start_capture(&pipeline, what)?;
        let end = EndSignal::new();
        watch_bus(&pipeline, label.to_string(), end.clone());

        tracing::info!(feed = label, fps = frame_rate, "Video capture started");
        Ok(Arc::new(Self {
            label: label.to_string(),
            pipeline,
            slot,
            frame_rate,
            stopped: AtomicBool::new(false),
            end,
        }))
    }
}

impl VideoFeed for GstVideoFeed {
    fn label(&self) -> &str {
        &self.label
    }

    fn native_size(&self) -> Option<FrameSize> {
        lock(&self.slot).size
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        lock(&self.slot).frame.clone()
    }

    fn frame_rate_hint(&self) -> Option<u32> {
        Some(self.frame_rate)
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(feed = %self.label, error = ?e, "Failed to stop video capture");
        }
        self.end.fire();
        tracing::info!(feed = %self.label, "Video capture stopped");
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && !self.end.is_fired()
    }

    fn ended(&self) -> watch::Receiver<bool> {
        self.end.subscribe()
    }
}

impl Drop for GstVideoFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// A GStreamer microphone delivering interleaved F32LE at 48 kHz stereo.
pub struct GstAudioFeed {
    label: String,
    pipeline: gst::Pipeline,
    pending: Arc<Mutex<Vec<f32>>>,
    stopped: AtomicBool,
    end: EndSignal,
}

impl GstAudioFeed {
    fn open(label: &str, source: &str) -> ClipmixResult<Arc<Self>> {
        let launch = format!(
            "{source} ! queue ! audioconvert ! audioresample ! audio/x-raw,format=F32LE,layout=interleaved,rate={AUDIO_RATE},channels={AUDIO_CHANNELS} ! appsink name=sink sync=false"
        );
        let pipeline = launch_pipeline(label, &launch)?;
        let sink: gst_app::AppSink = named(&pipeline, "sink")?;

        let pending = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&pending);
        sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;

                    let mut pending = lock(&writer);
                    pending.extend(
                        map.as_slice()
                            .chunks_exact(4)
                            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]])),
                    );
                    // Nobody is draining; keep only the newest samples.
                    if pending.len() > MAX_PENDING_SAMPLES {
                        let excess = pending.len() - MAX_PENDING_SAMPLES;
                        pending.drain(..excess);
                    }
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        start_capture(&pipeline, "microphone")?;
        let end = EndSignal::new();
        watch_bus(&pipeline, label.to_string(), end.clone());

        tracing::info!(feed = label, rate = AUDIO_RATE, "Audio capture started");
        Ok(Arc::new(Self {
            label: label.to_string(),
            pipeline,
            pending,
            stopped: AtomicBool::new(false),
            end,
        }))
    }
}

impl AudioFeed for GstAudioFeed {
    fn label(&self) -> &str {
        &self.label
    }

    fn sample_rate(&self) -> u32 {
        AUDIO_RATE
    }

    fn channels(&self) -> u16 {
        AUDIO_CHANNELS
    }

    fn take_samples(&self) -> Option<AudioBlock> {
        let samples = std::mem::take(&mut *lock(&self.pending));
        if samples.is_empty() {
            return None;
        }
        Some(AudioBlock {
            sample_rate: AUDIO_RATE,
            channels: AUDIO_CHANNELS,
            samples,
        })
    }

    fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(feed = %self.label, error = ?e, "Failed to stop audio capture");
        }
        self.end.fire();
        tracing::info!(feed = %self.label, "Audio capture stopped");
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::Acquire) && !self.end.is_fired()
    }
}

impl Drop for GstAudioFeed {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Platform capture through GStreamer source elements.
pub struct GstCaptureBackend {
    display_server: DisplayServer,
}

impl GstCaptureBackend {
    pub fn new() -> ClipmixResult<Self> {
        init_gstreamer()?;
        let display_server = detect_display_server();
        tracing::info!(?display_server, "Detected display server");
        Ok(Self { display_server })
    }

    pub fn display_server(&self) -> DisplayServer {
        self.display_server
    }

    fn display_source(&self, source_id: Option<&str>) -> ClipmixResult<String> {
        let id = source_id.unwrap_or("screen:0");
        let (kind, value) = id
            .split_once(':')
            .ok_or_else(|| ClipmixError::device_not_found(format!("Malformed source id '{id}'")))?;

        match (self.display_server, kind) {
            (DisplayServer::X11, "screen") => {
                Ok("ximagesrc use-damage=false remote=true show-pointer=true".to_string())
            }
            (DisplayServer::X11, "window") => Ok(format!(
                "ximagesrc xid={value} use-damage=false show-pointer=true"
            )),
            (DisplayServer::Windows, "screen") => {
                let index: u32 = value.parse().unwrap_or(0);
                Ok(format!(
                    "d3d11screencapturesrc monitor-index={index} show-cursor=true"
                ))
            }
            (DisplayServer::MacOS, "screen") => {
                let index: u32 = value.parse().unwrap_or(0);
                Ok(format!(
                    "avfvideosrc capture-screen=true capture-screen-cursor=true device-index={index}"
                ))
            }
            (DisplayServer::Wayland, _) => Err(ClipmixError::unsupported(
                "Wayland screen capture needs the desktop portal; run under an X11 session",
            )),
            (server, kind) => Err(ClipmixError::unsupported(format!(
                "Capturing '{kind}' sources is not supported on {server:?}"
            ))),
        }
    }

    fn microphone_source(&self) -> &'static str {
        match self.display_server {
            DisplayServer::Windows => "wasapisrc low-latency=true",
            _ => "autoaudiosrc",
        }
    }

    fn camera_source(&self, device_id: Option<&str>) -> ClipmixResult<String> {
        match self.display_server {
            DisplayServer::Windows => Ok("ksvideosrc device-index=0".to_string()),
            DisplayServer::MacOS => Ok("avfvideosrc device-index=0".to_string()),
            _ => {
                let device = match device_id {
                    Some(id) => id.trim_start_matches("camera:").to_string(),
                    None => detect_video_devices().into_iter().next().ok_or_else(|| {
                        ClipmixError::device_not_found(
                            "No webcam found (expected a /dev/video* node)",
                        )
                    })?,
                };
                Ok(format!("v4l2src device=\"{}\"", device.replace('"', "")))
            }
        }
    }
}

/// Existing `/dev/videoN` nodes, lowest index first.
fn detect_video_devices() -> Vec<String> {
    (0..16u32)
        .map(|idx| format!("/dev/video{idx}"))
        .filter(|path| std::path::Path::new(path).exists())
        .collect()
}

fn video_device_label(path: &str) -> String {
    let name = path
        .strip_prefix("/dev/")
        .and_then(|node| std::fs::read_to_string(format!("/sys/class/video4linux/{node}/name")).ok())
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    name.unwrap_or_else(|| path.to_string())
}

#[async_trait]
impl CaptureBackend for GstCaptureBackend {
    fn name(&self) -> &str {
        "gstreamer"
    }

    async fn list_sources(&self) -> ClipmixResult<Vec<Source>> {
        let mut sources = Vec::new();
        if self.display_server != DisplayServer::Wayland {
            sources.push(Source::new("screen:0", "Entire screen", SourceKind::Screen));
        }
        if matches!(self.display_server, DisplayServer::X11 | DisplayServer::Wayland | DisplayServer::Unknown) {
            for device in detect_video_devices() {
                let label = video_device_label(&device);
                sources.push(Source::new(format!("camera:{device}"), label, SourceKind::Camera));
            }
        }
        Ok(sources)
    }

    async fn acquire_display(&self, request: &DisplayRequest) -> ClipmixResult<Arc<dyn VideoFeed>> {
        let source = self.display_source(request.source_id.as_deref())?;
        let label = request.source_id.clone().unwrap_or_else(|| "screen:0".to_string());
        let frame_rate = request.frame_rate.max(1);
        let feed = tokio::task::spawn_blocking(move || {
            GstVideoFeed::open(&label, &source, frame_rate, None, "screen")
        })
        .await
        .map_err(|e| ClipmixError::capture(format!("Screen capture task failed: {e}")))??;
        Ok(feed)
    }

    async fn acquire_microphone(&self) -> ClipmixResult<Arc<dyn AudioFeed>> {
        let source = self.microphone_source();
        let feed = tokio::task::spawn_blocking(move || GstAudioFeed::open("microphone", source))
            .await
            .map_err(|e| ClipmixError::audio(format!("Microphone task failed: {e}")))??;
        Ok(feed)
    }

    async fn acquire_camera(&self, request: &CameraRequest) -> ClipmixResult<Arc<dyn VideoFeed>> {
        let source = self.camera_source(request.device_id.as_deref())?;
        let size = FrameSize::new(request.ideal_width.max(2), request.ideal_height.max(2));
        let feed = tokio::task::spawn_blocking(move || {
            GstVideoFeed::open("webcam", &source, 30, Some(size), "camera")
        })
        .await
        .map_err(|e| ClipmixError::capture(format!("Camera task failed: {e}")))??;
        Ok(feed)
    }
}

/// WebM encoders built from GStreamer elements.
#[derive(Debug, Clone, Copy, Default)]
pub struct GstEncoderBackend;

impl GstEncoderBackend {
    pub fn new() -> ClipmixResult<Self> {
        init_gstreamer()?;
        Ok(Self)
    }

    fn has(element: &str) -> bool {
        gst::ElementFactory::find(element).is_some()
    }

    fn video_encoder() -> Option<&'static str> {
        ["vp9enc", "vp8enc"].into_iter().find(|e| Self::has(e))
    }
}

impl EncoderBackend for GstEncoderBackend {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn is_type_supported(&self, mime_type: &str) -> bool {
        if !Self::has("webmmux") {
            return false;
        }
        match mime_type {
            MIME_VP9_OPUS => Self::has("vp9enc") && Self::has("opusenc"),
            MIME_VP9 => Self::has("vp9enc"),
            MIME_WEBM => Self::video_encoder().is_some(),
            _ => false,
        }
    }

    fn open(&self, params: &EncoderParams) -> ClipmixResult<Box<dyn IncrementalEncoder>> {
        if !self.is_type_supported(&params.mime_type) {
            return Err(ClipmixError::unsupported(format!(
                "GStreamer cannot encode '{}'",
                params.mime_type
            )));
        }
        Ok(Box::new(GstEncoder::open(params)?))
    }
}

struct GstEncoder {
    pipeline: gst::Pipeline,
    video_src: gst_app::AppSrc,
    audio_src: Option<gst_app::AppSrc>,
    output: Arc<Mutex<Vec<u8>>>,
    size: FrameSize,
    frame_duration: gst::ClockTime,
}

impl GstEncoder {
    fn open(params: &EncoderParams) -> ClipmixResult<Self> {
        let video_encoder = if params.mime_type.contains("vp9") {
            "vp9enc"
        } else {
            GstEncoderBackend::video_encoder()
                .ok_or_else(|| ClipmixError::encoder("No VP8/VP9 encoder element available"))?
        };
        let fps = params.frame_rate.max(1);
        let keyint = fps.saturating_mul(2).max(2);
        let bitrate = u64::from(params.video_bitrate_kbps) * 1000;

        let mut launch = format!(
            "appsrc name=vsrc ! videoconvert ! queue max-size-buffers=8 ! {video_encoder} deadline=1 cpu-used=8 target-bitrate={bitrate} keyframe-max-dist={keyint} ! webmmux name=mux streamable=true ! appsink name=out sync=false"
        );
        if params.audio.is_some() {
            launch.push_str(&format!(
                " appsrc name=asrc ! audioconvert ! audioresample ! opusenc bitrate={} ! queue ! mux.",
                params.audio_bitrate_bps
            ));
        }
        let pipeline = launch_pipeline("encoder", &launch)?;

        let video_src: gst_app::AppSrc = named(&pipeline, "vsrc")?;
        video_src.set_caps(Some(
            &gst::Caps::builder("video/x-raw")
                .field("format", "RGBA")
                .field("width", params.width as i32)
                .field("height", params.height as i32)
                .field("framerate", gst::Fraction::new(fps as i32, 1))
                .build(),
        ));
        video_src.set_format(gst::Format::Time);
        video_src.set_is_live(true);

        let audio_src = match params.audio {
            Some(format) => {
                let src: gst_app::AppSrc = named(&pipeline, "asrc")?;
                src.set_caps(Some(
                    &gst::Caps::builder("audio/x-raw")
                        .field("format", "F32LE")
                        .field("layout", "interleaved")
                        .field("rate", format.sample_rate as i32)
                        .field("channels", i32::from(format.channels))
                        .build(),
                ));
                src.set_format(gst::Format::Time);
                src.set_is_live(true);
                Some(src)
            }
            None => None,
        };

        let output = Arc::new(Mutex::new(Vec::new()));
        let writer = Arc::clone(&output);
        let sink: gst_app::AppSink = named(&pipeline, "out")?;
        sink.set_callbacks(
            gst_app::AppSinkCallbacks::builder()
                .new_sample(move |sink| {
                    let sample = sink.pull_sample().map_err(|_| gst::FlowError::Eos)?;
                    let buffer = sample.buffer().ok_or(gst::FlowError::Error)?;
                    let map = buffer.map_readable().map_err(|_| gst::FlowError::Error)?;
                    lock(&writer).extend_from_slice(map.as_slice());
                    Ok(gst::FlowSuccess::Ok)
                })
                .build(),
        );

        pipeline.set_state(gst::State::Playing).map_err(|e| {
            ClipmixError::encoder(format!("Failed to start encoder pipeline: {e:?}"))
        })?;
        tracing::info!(
            encoder = video_encoder,
            width = params.width,
            height = params.height,
            fps,
            audio = params.audio.is_some(),
            "Encoder pipeline started"
        );

        Ok(Self {
            pipeline,
            video_src,
            audio_src,
            output,
            size: params.size(),
            frame_duration: gst::ClockTime::from_nseconds(1_000_000_000 / u64::from(fps)),
        })
    }

    fn check_bus(&self) -> ClipmixResult<()> {
        let Some(bus) = self.pipeline.bus() else {
            return Ok(());
        };
        match bus.pop_filtered(&[gst::MessageType::Error]) {
            Some(msg) => match msg.view() {
                gst::MessageView::Error(e) => Err(ClipmixError::encoder(format!(
                    "Encoder pipeline error: {}",
                    e.error()
                ))),
                _ => Ok(()),
            },
            None => Ok(()),
        }
    }

    /// Send EOS and wait up to 10s for the muxer to flush.
    fn drain_eos(&self) {
        let _ = self.video_src.end_of_stream();
        if let Some(src) = &self.audio_src {
            let _ = src.end_of_stream();
        }

        let Some(bus) = self.pipeline.bus() else {
            return;
        };
        let deadline = Duration::from_secs(10);
        let start = std::time::Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= deadline {
                tracing::warn!("Encoder EOS drain timed out after 10s");
                break;
            }
            let remaining = gst::ClockTime::from_nseconds((deadline - elapsed).as_nanos() as u64);
            match bus.timed_pop(remaining) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => {
                        tracing::debug!("Encoder EOS received; output drained");
                        break;
                    }
                    gst::MessageView::Error(e) => {
                        tracing::warn!(error = %e.error(), "Encoder error during EOS drain");
                        break;
                    }
                    _ => {}
                },
                None => {
                    tracing::warn!("Encoder EOS drain timed out after 10s");
                    break;
                }
            }
        }
    }
}

impl IncrementalEncoder for GstEncoder {
    fn encode_video(&mut self, frame: &VideoFrame, pts_ns: u64) -> ClipmixResult<()> {
        self.check_bus()?;
        let image = if frame.size() == self.size {
            frame.image.clone()
        } else {
            imageops::resize(&frame.image, self.size.width, self.size.height, FilterType::Triangle)
        };

        let mut buffer = gst::Buffer::from_mut_slice(image.into_raw());
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(gst::ClockTime::from_nseconds(pts_ns));
            buffer.set_duration(self.frame_duration);
        }
        self.video_src
            .push_buffer(buffer)
            .map_err(|e| ClipmixError::encoder(format!("Failed to push video frame: {e:?}")))?;
        Ok(())
    }

    fn encode_audio(&mut self, block: &AudioBlock, pts_ns: u64) -> ClipmixResult<()> {
        let Some(src) = &self.audio_src else {
            return Ok(());
        };
        let bytes: Vec<u8> = block.samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        let mut buffer = gst::Buffer::from_mut_slice(bytes);
        if let Some(buffer) = buffer.get_mut() {
            buffer.set_pts(gst::ClockTime::from_nseconds(pts_ns));
            buffer.set_duration(gst::ClockTime::from_nseconds(block.duration_ns()));
        }
        src.push_buffer(buffer)
            .map_err(|e| ClipmixError::encoder(format!("Failed to push audio block: {e:?}")))?;
        Ok(())
    }

    fn drain(&mut self) -> ClipmixResult<Vec<u8>> {
        self.check_bus()?;
        Ok(std::mem::take(&mut *lock(&self.output)))
    }

    fn finish(self: Box<Self>) -> ClipmixResult<Vec<u8>> {
        self.drain_eos();
        self.pipeline.set_state(gst::State::Null).map_err(|e| {
            ClipmixError::encoder(format!("Failed to stop encoder pipeline: {e:?}"))
        })?;
        Ok(std::mem::take(&mut *lock(&self.output)))
    }
}
