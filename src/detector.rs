//! In-band DTMF tone detection
//!
//! Inband means the digits travel inside the call audio itself, so only
//! uncompressed voice paths (g711 after upstream decode) carry them
//! reliably. The detector consumes 8 kHz / 16-bit / mono little-endian
//! linear PCM in arbitrarily sized chunks, evaluates fixed-length windows
//! with a bank of Goertzel resonators, and reports each digit exactly once
//! per guard interval to the registered observers.

use std::sync::Arc;
use std::time::Duration;

use tracing::{trace, warn};

use crate::config::DetectorConfig;
use crate::event::{DtmfEvent, DtmfEventObserver, ObserverSet};
use crate::goertzel::GoertzelFilter;
use crate::Result;

/// Low-group DTMF frequencies (Hz), one per keypad row.
pub const LOW_FREQUENCIES: [u32; 4] = [697, 770, 852, 941];

/// High-group DTMF frequencies (Hz), one per keypad column.
pub const HIGH_FREQUENCIES: [u32; 4] = [1209, 1336, 1477, 1633];

/// Standard keypad grid indexed by [low][high] dominant frequency.
const TONE_GRID: [[char; 4]; 4] = [
    ['1', '2', '3', 'A'],
    ['4', '5', '6', 'B'],
    ['7', '8', '9', 'C'],
    ['*', '0', '#', 'D'],
];

/// Guards the dominance-ratio division against an all-zero bin.
const RATIO_EPSILON: f64 = 1e-15;

const SAMPLES_PER_MS: usize = 8;

/// Streaming in-band DTMF detector.
///
/// Driven by a single producer delivering PCM chunks in stream order via
/// [`detect`](Self::detect); the window accumulator and debounce state are
/// not isolated across interleaved callers. Observer management is safe
/// from any thread through the shared [`ObserverSet`] handle.
pub struct DtmfDetector {
    level: i32,
    /// Amplitude gate for window evaluation, reused as the minimum
    /// dominance ratio in `choose_tone`. The two sensitivities are
    /// deliberately one tunable; splitting them changes detection
    /// behavior and is pinned by tests.
    threshold: f64,
    tone_duration: u32,
    tone_interval: u32,
    n: usize,
    low_filters: [GoertzelFilter; 4],
    high_filters: [GoertzelFilter; 4],
    signal: Vec<f64>,
    offset: usize,
    max_amplitude: f64,
    last_tone: Option<char>,
    elapsed: Duration,
    waiting: bool,
    observers: ObserverSet,
}

impl DtmfDetector {
    /// Creates a detector from raw tuning values: `tone_volume` in dB
    /// (at or below zero), window and guard lengths in milliseconds.
    pub fn new(tone_volume: i32, tone_duration: u32, tone_interval: u32) -> Result<Self> {
        Self::from_config(&DetectorConfig {
            tone_volume,
            tone_duration,
            tone_interval,
        })
    }

    pub fn from_config(config: &DetectorConfig) -> Result<Self> {
        config.validate()?;

        let threshold = 10f64.powf(config.tone_volume as f64 / 10.0) * f64::from(i16::MAX);
        let n = SAMPLES_PER_MS * config.tone_duration as usize;
        let scale = config.tone_duration as f64 / 1000.0;

        let low_filters = LOW_FREQUENCIES.map(|f| GoertzelFilter::new(f as f64, n, scale));
        let high_filters = HIGH_FREQUENCIES.map(|f| GoertzelFilter::new(f as f64, n, scale));

        Ok(Self {
            level: config.tone_volume,
            threshold,
            tone_duration: config.tone_duration,
            tone_interval: config.tone_interval,
            n,
            low_filters,
            high_filters,
            signal: vec![0.0; n],
            offset: 0,
            max_amplitude: 0.0,
            last_tone: None,
            elapsed: Duration::ZERO,
            waiting: false,
            observers: ObserverSet::new(),
        })
    }

    pub fn volume(&self) -> i32 {
        self.level
    }

    /// Analysis window length in milliseconds.
    pub fn duration(&self) -> u32 {
        self.tone_duration
    }

    /// Minimum gap enforced between two reported digits, in milliseconds.
    pub fn interdigit_interval(&self) -> u32 {
        self.tone_interval
    }

    /// The shared amplitude-gate / dominance-ratio threshold.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// The most recently reported digit, if any.
    pub fn last_tone(&self) -> Option<char> {
        self.last_tone
    }

    /// A management handle onto the observer registry, safe to use from a
    /// different thread than the one driving `detect`.
    pub fn observers(&self) -> ObserverSet {
        self.observers.clone()
    }

    pub fn observe(&self, observer: Arc<dyn DtmfEventObserver>) {
        self.observers.observe(observer);
    }

    pub fn forget(&self, observer: &Arc<dyn DtmfEventObserver>) {
        self.observers.forget(observer);
    }

    pub fn clear_all(&self) {
        self.observers.clear_all();
    }

    /// Feeds one chunk of little-endian 16-bit mono PCM into the detector.
    ///
    /// `duration` is the playback time the chunk represents; it drives the
    /// guard-interval bookkeeping while the detector is debouncing a
    /// reported digit. Chunks need not align to the analysis window; a
    /// single call may complete zero or more windows and synchronously
    /// notify observers for each recognized digit. An odd trailing byte
    /// violates the input contract and is dropped with a warning.
    pub fn detect(&mut self, data: &[u8], duration: Duration) {
        // While debouncing, drop whole chunks until the guard interval has
        // elapsed; the chunk that crosses the boundary is still consumed.
        if self.waiting {
            self.elapsed += duration;
            if self.elapsed < Duration::from_millis(u64::from(self.tone_interval)) {
                return;
            }
            self.waiting = false;
            trace!(
                last_tone = ?self.last_tone,
                elapsed_ms = self.elapsed.as_millis() as u64,
                "guard interval elapsed, resuming detection"
            );
        }

        if data.len() % 2 != 0 {
            warn!(len = data.len(), "odd-length PCM chunk, dropping trailing byte");
        }

        for pair in data.chunks_exact(2) {
            let sample = f64::from(i16::from_le_bytes([pair[0], pair[1]]));
            if sample.abs() > self.max_amplitude {
                self.max_amplitude = sample.abs();
            }

            self.signal[self.offset] = sample;
            self.offset += 1;

            if self.offset == self.n {
                self.offset = 0;
                self.evaluate_window();
            }
        }
    }

    /// Evaluates one completed window: amplitude gate, resonator bank,
    /// dominance test, then debounce arming and observer fan-out.
    fn evaluate_window(&mut self) {
        let peak = self.max_amplitude;
        self.max_amplitude = 0.0;

        // Sub-threshold windows are silence or background noise; skipping
        // them avoids running the filter bank on the common idle case.
        if peak < self.threshold {
            return;
        }

        let mut low_powers = [0.0; 4];
        let mut high_powers = [0.0; 4];
        for i in 0..4 {
            low_powers[i] = self.low_filters[i].power(&self.signal, 0);
            high_powers[i] = self.high_filters[i].power(&self.signal, 0);
        }

        if let Some(tone) = self.choose_tone(&low_powers, &high_powers) {
            self.last_tone = Some(tone);
            self.elapsed = Duration::ZERO;
            self.waiting = true;
            trace!(%tone, "dtmf digit detected, arming guard interval");
            self.observers.notify(DtmfEvent::new(tone));
        }
    }

    /// Picks the digit whose row and column tones each clearly dominate
    /// their group, or `None` when either group is ambiguous.
    fn choose_tone(&self, low_powers: &[f64; 4], high_powers: &[f64; 4]) -> Option<char> {
        let fm = max_index(low_powers);
        for (i, &power) in low_powers.iter().enumerate() {
            if i == fm {
                continue;
            }
            if low_powers[fm] / (power + RATIO_EPSILON) < self.threshold {
                return None;
            }
        }

        let hm = max_index(high_powers);
        for (i, &power) in high_powers.iter().enumerate() {
            if i == hm {
                continue;
            }
            if high_powers[hm] / (power + RATIO_EPSILON) < self.threshold {
                return None;
            }
        }

        Some(TONE_GRID[fm][hm])
    }
}

fn max_index(powers: &[f64; 4]) -> usize {
    let mut idx = 0;
    for i in 1..powers.len() {
        if powers[i] > powers[idx] {
            idx = i;
        }
    }
    idx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generator::DtmfGenerator;
    use crate::Error;
    use rand::Rng;
    use std::f64::consts::PI;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Collector {
        seen: Mutex<Vec<char>>,
    }

    impl DtmfEventObserver for Collector {
        fn on_dtmf_event(&self, event: DtmfEvent) {
            self.seen.lock().unwrap().push(event.tone());
        }
    }

    impl Collector {
        fn tones(&self) -> Vec<char> {
            self.seen.lock().unwrap().clone()
        }
    }

    /// Feeds `samples` in chunks of `chunk_samples`, with each chunk's
    /// duration matching its playback time at 8 kHz.
    fn feed(detector: &mut DtmfDetector, samples: &[i16], chunk_samples: usize) {
        for chunk in samples.chunks(chunk_samples) {
            let bytes = DtmfGenerator::to_bytes(chunk);
            detector.detect(&bytes, Duration::from_micros(chunk.len() as u64 * 125));
        }
    }

    fn mixed_tone(freqs: &[f64], amplitude: f64, duration_ms: u32) -> Vec<i16> {
        let len = 8 * duration_ms as usize;
        (0..len)
            .map(|i| {
                let t = i as f64 / 8000.0;
                let v: f64 = freqs.iter().map(|f| (2.0 * PI * f * t).sin()).sum();
                (v * amplitude) as i16
            })
            .collect()
    }

    fn wired_detector(
        volume: i32,
        duration: u32,
        interval: u32,
    ) -> (DtmfDetector, Arc<Collector>) {
        let detector = DtmfDetector::new(volume, duration, interval).unwrap();
        let collector = Arc::new(Collector::default());
        detector.observe(collector.clone());
        (detector, collector)
    }

    #[test]
    fn test_rejects_invalid_construction() {
        assert!(matches!(
            DtmfDetector::new(-35, 0, 100),
            Err(Error::InvalidConfiguration(_))
        ));
        assert!(DtmfDetector::new(-35, 100, 0).is_err());
        assert!(DtmfDetector::new(5, 100, 100).is_err());
    }

    #[test]
    fn test_accessors_reflect_configuration() {
        let detector = DtmfDetector::new(-35, 80, 250).unwrap();
        assert_eq!(detector.volume(), -35);
        assert_eq!(detector.duration(), 80);
        assert_eq!(detector.interdigit_interval(), 250);
        assert_eq!(detector.last_tone(), None);
    }

    #[test]
    fn test_amplitude_gate_and_ratio_floor_share_threshold() {
        // The amplitude gate and the dominance-ratio floor are one value;
        // this pins the coupling so it cannot drift apart silently.
        let detector = DtmfDetector::new(-35, 100, 100).unwrap();
        assert!((detector.threshold() - 10f64.powf(-3.5) * 32767.0).abs() < 1e-9);
    }

    #[test]
    fn test_silence_emits_nothing() {
        let (mut detector, collector) = wired_detector(-35, 100, 100);
        let generator = DtmfGenerator::new(8000);
        feed(&mut detector, &generator.silence(1000), 160);
        assert!(collector.tones().is_empty());
    }

    #[test]
    fn test_sub_threshold_noise_is_gated() {
        // -35 dB gate sits at ~10.4 amplitude units; noise below it must
        // never reach the filter bank or produce an event.
        let (mut detector, collector) = wired_detector(-35, 100, 100);
        let mut rng = rand::thread_rng();
        let noise: Vec<i16> = (0..8000).map(|_| rng.gen_range(-8..=8)).collect();
        feed(&mut detector, &noise, 160);
        assert!(collector.tones().is_empty());
    }

    #[test]
    fn test_every_digit_is_detected_once() {
        let generator = DtmfGenerator::new(8000);
        for digit in [
            '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', 'A', 'B', 'C', 'D', '*', '#',
        ] {
            let (mut detector, collector) = wired_detector(-35, 100, 100);
            feed(&mut detector, &generator.generate_tone(digit, 100), 160);
            assert_eq!(collector.tones(), vec![digit], "digit {}", digit);
            assert_eq!(detector.last_tone(), Some(digit));
        }
    }

    #[test]
    fn test_four_digits_in_order() {
        let generator = DtmfGenerator::new(8000);
        let (mut detector, collector) = wired_detector(-35, 100, 100);

        let mut stream = Vec::new();
        for digit in ['1', '2', '3', '4'] {
            stream.extend(generator.generate_tone(digit, 100));
            stream.extend(generator.silence(200));
        }
        feed(&mut detector, &stream, 160);

        assert_eq!(collector.tones(), vec!['1', '2', '3', '4']);
    }

    #[test]
    fn test_digit_pairs_with_exact_interval_gaps() {
        // Bursts separated by exactly the guard interval of silence must
        // all be reported: the boundary-crossing chunk is processed.
        let generator = DtmfGenerator::new(8000);
        let (mut detector, collector) = wired_detector(-35, 100, 200);

        let mut stream = Vec::new();
        for digit in ['1', '1', '2', '2'] {
            stream.extend(generator.generate_tone(digit, 100));
            stream.extend(generator.silence(200));
        }
        feed(&mut detector, &stream, 160);

        assert_eq!(collector.tones(), vec!['1', '1', '2', '2']);
    }

    #[test]
    fn test_chunking_invariance() {
        // The same logical stream split into differently sized detect
        // calls yields the same digit sequence.
        let generator = DtmfGenerator::new(8000);
        let mut stream = Vec::new();
        stream.extend(generator.generate_tone('7', 100));
        stream.extend(generator.silence(200));
        stream.extend(generator.generate_tone('9', 100));

        for chunk_samples in [80, 160, 400, stream.len()] {
            let (mut detector, collector) = wired_detector(-35, 100, 100);
            feed(&mut detector, &stream, chunk_samples);
            assert_eq!(
                collector.tones(),
                vec!['7', '9'],
                "chunk size {}",
                chunk_samples
            );
        }
    }

    #[test]
    fn test_guard_interval_collapses_close_digits() {
        // A second digit arriving within the guard interval is suppressed.
        let generator = DtmfGenerator::new(8000);
        let (mut detector, collector) = wired_detector(-35, 100, 100);

        let mut stream = Vec::new();
        stream.extend(generator.generate_tone('1', 100));
        stream.extend(generator.silence(40));
        stream.extend(generator.generate_tone('2', 100));
        feed(&mut detector, &stream, 160);

        assert_eq!(collector.tones(), vec!['1']);
    }

    #[test]
    fn test_sustained_tone_is_debounced() {
        // One second of continuous tone in 20 ms packets: after each
        // report the detector drops packets for the guard interval, then
        // refills the window, so emissions repeat every 180 ms here.
        let generator = DtmfGenerator::new(8000);
        let (mut detector, collector) = wired_detector(-35, 100, 100);

        feed(&mut detector, &generator.generate_tone('5', 1000), 160);

        let tones = collector.tones();
        assert_eq!(tones.len(), 6);
        assert!(tones.iter().all(|&t| t == '5'));
    }

    #[test]
    fn test_oversized_chunk_may_emit_per_window() {
        // The guard interval is only consulted at call entry, so a single
        // oversized chunk of sustained tone reports once per completed
        // window. This pins that behavior.
        let generator = DtmfGenerator::new(8000);
        let (mut detector, collector) = wired_detector(-35, 100, 100);

        let tone = generator.generate_tone('8', 300);
        let bytes = DtmfGenerator::to_bytes(&tone);
        detector.detect(&bytes, Duration::from_millis(300));

        assert_eq!(collector.tones(), vec!['8', '8', '8']);
    }

    #[test]
    fn test_ambiguous_low_group_is_rejected() {
        // Two comparably strong row tones leave no dominant bin, so the
        // window must be discarded even with a clean column tone present.
        let (mut detector, collector) = wired_detector(-35, 100, 100);

        let signal = mixed_tone(&[697.0, 770.0, 1336.0], 9000.0, 400);
        feed(&mut detector, &signal, 160);

        assert!(collector.tones().is_empty());
        assert_eq!(detector.last_tone(), None);
    }

    #[test]
    fn test_forgotten_observer_hears_nothing() {
        let generator = DtmfGenerator::new(8000);
        let mut detector = DtmfDetector::new(-35, 100, 100).unwrap();

        let dropped = Arc::new(Collector::default());
        let kept = Arc::new(Collector::default());
        let dropped_handle: Arc<dyn DtmfEventObserver> = dropped.clone();

        detector.observe(dropped_handle.clone());
        detector.observe(kept.clone());
        detector.forget(&dropped_handle);

        feed(&mut detector, &generator.generate_tone('3', 100), 160);

        assert!(dropped.tones().is_empty());
        assert_eq!(kept.tones(), vec!['3']);
    }

    #[test]
    fn test_odd_length_chunk_is_truncated() {
        // A trailing odd byte is dropped without corrupting the window
        // accumulator or panicking.
        let generator = DtmfGenerator::new(8000);
        let (mut detector, collector) = wired_detector(-35, 100, 100);

        let mut bytes = DtmfGenerator::to_bytes(&generator.generate_tone('6', 100));
        bytes.push(0x7f);
        detector.detect(&bytes, Duration::from_millis(100));
        assert_eq!(collector.tones(), vec!['6']);

        // The accumulator keeps working across subsequent calls.
        detector.detect(
            &DtmfGenerator::to_bytes(&generator.silence(200)),
            Duration::from_millis(200),
        );
        feed(&mut detector, &generator.generate_tone('4', 100), 160);
        assert_eq!(collector.tones(), vec!['6', '4']);
    }

    #[test]
    fn test_from_config_defaults() {
        let detector = DtmfDetector::from_config(&DetectorConfig::default()).unwrap();
        assert_eq!(detector.volume(), -35);
        assert_eq!(detector.duration(), 100);
        assert_eq!(detector.interdigit_interval(), 100);
    }
}
