use if_chain::if_chain;
use ecg_frontend::config::DetectorConfig;
use ecg_frontend::evaluate::{score, score_flags, DEFAULT_TOLERANCE};
use ecg_frontend::filter::{Conditioner, Pipeline200Hz, Pipeline64Hz};
use ecg_frontend::frontend::{Frontend, SampleLink, SampleRecord};
use ecg_frontend::sampling::*;
use ecg_frontend::{QrsDetector, StaticThresholdDetector};

const BASELINE: u16 = 2048;
const PERIOD: usize = 160;
const FIRST: usize = 20;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// ADC samples with a sharp spike every `PERIOD` samples, the first one at `FIRST`.
fn simulated_adc(len: usize) -> Vec<u16> {
    (0..len)
        .map(|n| {
            if n >= FIRST && (n - FIRST) % PERIOD == 0 {
                BASELINE + 1500
            } else {
                BASELINE
            }
        })
        .collect()
}

/// Spike positions in `range`.
fn spikes(range: core::ops::Range<usize>) -> Vec<u32> {
    (FIRST..range.end)
        .step_by(PERIOD)
        .filter(|n| range.contains(n))
        .map(|n| n as u32)
        .collect()
}

#[test]
fn test_simulated_signal() {
    init_logger();

    let mut filters = Pipeline200Hz::new();
    let mut detector = QrsDetector::new::<30>(DetectorConfig::for_sampling_frequency(200.sps()));

    let mut prev: Option<u32> = None;
    let mut beats = vec![];
    let mut intervals = vec![];

    for raw in simulated_adc(3000) {
        let filtered = filters.condition(raw);
        let beat = detector.update(filtered);
        beats.extend(beat);
        if_chain! {
            if let Some(beat) = beat;
            if let Some(p) = prev.replace(beat);
            then {
                intervals.push(beat - p);
            }
        }
    }

    // nothing is reported during the 2 s learning phase
    let score = score(beats.iter().copied(), &spikes(400..3000), DEFAULT_TOLERANCE);
    assert_eq!((score.tp, score.fp, score.fn_), (16, 0, 0));
    assert_eq!(detector.peak_count(), 16);

    // thresholds settle on the rising edge of the integrated energy, give or take a sample
    assert!(
        intervals.iter().all(|&rr| rr.abs_diff(PERIOD as u32) <= 1),
        "{:?}",
        intervals
    );

    let bpm = detector.heart_rate().unwrap();
    assert!((bpm - 75.0).abs() < 0.5, "heart rate {}", bpm);
}

#[test]
fn frontend_streams_records_and_detects_window() {
    init_logger();

    let link: SampleLink<512> = SampleLink::new(256);
    link.init().unwrap();

    let mut frontend: Frontend<_, StaticThresholdDetector, _, 512, 2000> = Frontend::new(
        Pipeline200Hz::new(),
        QrsDetector::new::<30>(DetectorConfig::default()),
        StaticThresholdDetector::default(),
        &link,
    );

    let adc = simulated_adc(3000);
    let mut received = vec![];
    let mut beats = vec![];
    let mut window_peaks = vec![];
    let mut first_signal = None;

    for (n, &raw) in adc.iter().enumerate() {
        let tick = frontend.on_sample(raw);
        assert_eq!(tick.written, Ok(SampleRecord::SIZE));
        if let Some(beat) = tick.beat {
            beats.push(beat);
        }
        if let Some(peaks) = tick.window_peaks {
            window_peaks.push((n, peaks));
        }

        // main loop
        if link.take_send_signal() {
            first_signal.get_or_insert(n);
            let mut out = [0; 512];
            let count = link.drain(&mut out).unwrap();
            received.extend_from_slice(&out[..count]);
        }
    }

    // 64 records of 4 bytes reach the threshold
    assert_eq!(first_signal, Some(63));
    let streaming = score(beats, &spikes(400..3000), DEFAULT_TOLERANCE);
    assert_eq!((streaming.sensitivity, streaming.ppv), (1.0, 1.0));

    assert_eq!(window_peaks, [(1999, 13)]);
    let flags = frontend.window_flags().unwrap();
    let window = score_flags(flags, &spikes(0..2000), DEFAULT_TOLERANCE);
    assert_eq!((window.tp, window.fp, window.fn_), (13, 0, 0));

    // records arrive in order and carry the raw samples
    assert_eq!(received.len() % SampleRecord::SIZE, 0);
    let raws: Vec<u16> = received
        .chunks_exact(SampleRecord::SIZE)
        .map(|chunk| SampleRecord::decode([chunk[0], chunk[1], chunk[2], chunk[3]]).raw)
        .collect();
    assert_eq!(raws, adc[..raws.len()]);
}

#[test]
fn adaptive_batch_detector_runs_per_window() {
    init_logger();

    let link: SampleLink<64> = SampleLink::new(32);
    link.init().unwrap();

    let mut frontend: Frontend<_, QrsDetector<[i32; 30]>, _, 64, 2000> = Frontend::new(
        Pipeline200Hz::new(),
        QrsDetector::new::<30>(DetectorConfig::default()),
        QrsDetector::new::<30>(DetectorConfig::default()),
        &link,
    );

    let adc = simulated_adc(4000);
    let mut windows = vec![];
    for (n, &raw) in adc.iter().enumerate() {
        if n == 2000 {
            let first = score_flags(frontend.window_flags().unwrap(), &spikes(400..2000), 2);
            assert_eq!((first.tp, first.fp, first.fn_), (10, 0, 0));
            frontend.rearm_window();
        }

        if let Some(peaks) = frontend.on_sample(raw).window_peaks {
            windows.push((n, peaks));
        }
        let mut out = [0; 64];
        link.drain(&mut out).unwrap();
    }

    assert_eq!(windows, [(1999, 10), (3999, 10)]);
}

#[test]
fn board_chain_at_64_sps() {
    init_logger();

    const RR: usize = 51;
    let mut adc = vec![BASELINE; 1280];
    let mut peaks = vec![];
    for n in (40..1277).step_by(RR) {
        adc[n] += 400;
        adc[n + 1] += 1000;
        adc[n + 2] += 400;
        peaks.push(n as u32 + 1);
    }

    let config = DetectorConfig::board_64hz();
    let mut filters = Pipeline64Hz::new();
    let mut detector = QrsDetector::new::<10>(config);

    let beats: Vec<u32> = adc
        .iter()
        .filter_map(|&raw| detector.update(filters.condition(raw)))
        .collect();

    let reference: Vec<u32> = peaks.into_iter().filter(|&p| p >= config.learning).collect();
    let score = score(beats, &reference, 3);
    assert_eq!((score.tp, score.fp, score.fn_), (23, 0, 0));
    assert_eq!(detector.rr_average2(), Some(RR as u32));
}
