//! Performance benchmarks for the audio bridge hot path
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use bytes::Bytes;
use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use voice_call_gateway::core::audio::resample_pcm16;
use voice_call_gateway::core::realtime::ClientEvent;
use voice_call_gateway::core::telephony::{InboundFrame, OutboundFrame};
use voice_call_gateway::utils::validate_phone_number;

/// 20 ms of a 440 Hz tone at `rate`
fn tone(rate: u32) -> Vec<u8> {
    let samples = rate as usize / 50;
    (0..samples)
        .map(|i| {
            let t = i as f32 / rate as f32;
            ((t * 440.0 * std::f32::consts::TAU).sin() * 8000.0) as i16
        })
        .flat_map(i16::to_le_bytes)
        .collect()
}

fn bench_resampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resample_pcm16");
    group.measurement_time(Duration::from_secs(5));

    for (from, to) in [(16000, 24000), (24000, 16000), (24000, 24000)] {
        let frame = tone(from);
        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(
            BenchmarkId::new(format!("{from}_to_{to}"), frame.len()),
            &frame,
            |b, frame| {
                b.iter(|| resample_pcm16(black_box(frame), from, to));
            },
        );
    }

    group.finish();
}

fn bench_frames(c: &mut Criterion) {
    let mut group = c.benchmark_group("media_frames");

    let pcm = tone(24000);
    let inbound = serde_json::json!({
        "Kind": "AudioData",
        "AudioData": {
            "Data": BASE64.encode(&pcm),
            "Timestamp": "2024-05-01T12:00:00.000Z",
            "ParticipantRawID": "4:+14255550123",
            "Silent": false
        }
    })
    .to_string();

    group.throughput(Throughput::Bytes(inbound.len() as u64));
    group.bench_function("parse_audio_data", |b| {
        b.iter(|| InboundFrame::parse(black_box(&inbound)));
    });

    let outbound = OutboundFrame::Audio(Bytes::from(pcm.clone()));
    group.bench_function("serialize_audio_data", |b| {
        b.iter(|| black_box(&outbound).to_json());
    });

    group.bench_function("serialize_stop_audio", |b| {
        b.iter(|| black_box(&OutboundFrame::StopAudio).to_json());
    });

    group.bench_function("speech_audio_append", |b| {
        b.iter(|| serde_json::to_string(&ClientEvent::audio_append(black_box(&pcm))));
    });

    group.finish();
}

fn bench_phone_validation(c: &mut Criterion) {
    let mut group = c.benchmark_group("phone_validation");

    for number in ["+14255550100", "4255550100", "+1 (425) 555-0100"] {
        group.bench_with_input(BenchmarkId::from_parameter(number), &number, |b, n| {
            b.iter(|| validate_phone_number(black_box(n)));
        });
    }

    group.finish();
}

criterion_group!(benches, bench_resampling, bench_frames, bench_phone_validation);
criterion_main!(benches);
