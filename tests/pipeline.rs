//! End-to-end runs of the analysis loop with synthetic sources.

use live_spectrogram::{
    AnalysisLoop, DisplayConfig, FrameSource, LoopState, Renderer, ScrollBuffer, Snapshot,
    SpectralSlice, SpectralTransformer, SpectrogramConfig, SpectrogramError, TerminalRenderer,
    ToneSource,
};

/// Keeps a row-major copy of the last snapshot it was shown.
#[derive(Default)]
struct CaptureRenderer {
    frames: usize,
    rows: usize,
    columns: usize,
    matrix: Vec<f32>,
    freqs: Vec<f32>,
}

impl Renderer for CaptureRenderer {
    fn display(
        &mut self,
        snapshot: Snapshot<'_>,
        freqs: &[f32],
        _times: &[f32],
    ) -> Result<(), SpectrogramError> {
        self.frames += 1;
        self.rows = snapshot.rows();
        self.columns = snapshot.columns();
        self.matrix = snapshot.to_row_major();
        self.freqs = freqs.to_vec();
        Ok(())
    }
}

#[test]
fn tone_session_scrolls_at_reference_settings() {
    let config = SpectrogramConfig::default();
    let source = ToneSource::new(&config, 2000.0, 0.5).unwrap();
    let mut session = AnalysisLoop::start(config, source, CaptureRenderer::default()).unwrap();

    let mut history = vec![session.snapshot().columns()];
    for _ in 0..5 {
        session.tick().unwrap();
        history.push(session.snapshot().columns());
    }
    assert_eq!(history, vec![299, 598, 897, 1196, 1196, 1196]);
    assert_eq!(session.state(), LoopState::Idle);

    let snapshot = session.snapshot();
    assert_eq!(snapshot.rows(), 513);
    let expected_row = session
        .freqs()
        .iter()
        .position(|&f| f == 2000.0)
        .unwrap();
    for col in [0, 600, 1195] {
        let column = snapshot.column(col);
        let peak = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(row, _)| row)
            .unwrap();
        assert_eq!(peak, expected_row, "column {col}");
    }

    assert_eq!(session.stop(), 5);
}

#[test]
fn renderer_sees_every_update() {
    let config = SpectrogramConfig {
        samples_per_frame: 2,
        ..Default::default()
    };
    let source = ToneSource::new(&config, 440.0, 0.25).unwrap();
    let mut session = AnalysisLoop::start(config, source, CaptureRenderer::default()).unwrap();
    for _ in 0..3 {
        session.tick().unwrap();
    }

    let seen = session.renderer();
    assert_eq!(seen.frames, 4);
    assert_eq!(seen.rows, 513);
    assert_eq!(seen.columns, 598);
    assert_eq!(seen.matrix.len(), 513 * 598);
    assert_eq!(seen.freqs.len(), 513);
}

#[test]
fn closing_the_source_surfaces_a_device_error() {
    let config = SpectrogramConfig::default();
    let mut source = ToneSource::new(&config, 440.0, 0.25).unwrap();
    source.close();
    let result = AnalysisLoop::start(config, source, CaptureRenderer::default());
    assert!(matches!(result, Err(SpectrogramError::Device(_))));
}

#[test]
fn repeated_slices_keep_the_last_append_verbatim() {
    let config = SpectrogramConfig::default();
    let mut stft = SpectralTransformer::new(&config).unwrap();
    let mut tone = ToneSource::new(&config, 1234.0, 0.7).unwrap();

    let first = stft.transform(&tone.acquire_frame().unwrap()).unwrap();
    let mut buffer = ScrollBuffer::seed(&first, config.keep_columns()).unwrap();
    let mut last: Option<SpectralSlice> = None;
    for _ in 0..7 {
        let slice = stft.transform(&tone.acquire_frame().unwrap()).unwrap();
        buffer.append(&slice).unwrap();
        last = Some(slice);
    }
    let last = last.unwrap();

    let snapshot = buffer.snapshot();
    assert_eq!(snapshot.columns(), config.keep_columns());
    let offset = snapshot.columns() - last.columns();
    for c in 0..last.columns() {
        assert_eq!(snapshot.column(offset + c), last.column(c));
    }
}

#[test]
fn terminal_renderer_runs_inside_a_session() {
    let config = SpectrogramConfig::default();
    let source = ToneSource::new(&config, 3000.0, 0.5).unwrap();
    let renderer = TerminalRenderer::new(Vec::new(), 80, 24, &DisplayConfig::default());
    let mut session = AnalysisLoop::start(config, source, renderer).unwrap();
    session.tick().unwrap();
    assert_eq!(session.ticks(), 1);
}

#[test]
fn resizing_the_session_renderer_redraws_at_the_new_size() {
    let config = SpectrogramConfig::default();
    let source = ToneSource::new(&config, 3000.0, 0.5).unwrap();
    let renderer = TerminalRenderer::new(Vec::new(), 80, 24, &DisplayConfig::default());
    let mut session = AnalysisLoop::start(config, source, renderer).unwrap();

    session.renderer_mut().resize(120, 40);
    session.tick().unwrap();
    assert_eq!(session.ticks(), 1);
    assert_eq!(session.snapshot().columns(), 598);
}
