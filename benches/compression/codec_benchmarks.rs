use codec_engine::compression::{
    BlockTransformCodec, Compression, HuffmanCodec, Lz77Codec, Lz78Codec, RleCodec,
};
use codec_engine::{CompressionConfig, Compressor, ContentClass, Mode, Quality};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use rand::{Rng, SeedableRng};

fn text_data(size: usize) -> Vec<u8> {
    let words = [
        "compression ", "block ", "stream ", "the ", "of ", "window ", "dictionary ", "code ",
    ];
    let mut rng = rand::rngs::StdRng::seed_from_u64(42);
    let mut data = Vec::with_capacity(size);
    while data.len() < size {
        data.extend_from_slice(words[rng.gen_range(0..words.len())].as_bytes());
    }
    data.truncate(size);
    data
}

fn sample_data(size: usize) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(7);
    (0..size)
        .map(|i| {
            let base = 128.0 + 60.0 * (i as f64 * 0.05).sin();
            (base + rng.gen_range(-10.0..10.0)).clamp(0.0, 255.0) as u8
        })
        .collect()
}

fn bench_codecs(c: &mut Criterion) {
    let mut group = c.benchmark_group("codecs");
    let codecs: Vec<(&str, Box<dyn Compression>)> = vec![
        ("huffman", Box::new(HuffmanCodec)),
        ("rle", Box::new(RleCodec::default())),
        ("lz77", Box::new(Lz77Codec::default())),
        ("lz78", Box::new(Lz78Codec::default())),
    ];

    for size in [1024, 16384, 131072] {
        let data = text_data(size);
        for (name, codec) in &codecs {
            group.bench_with_input(BenchmarkId::new(*name, size), &data, |b, data| {
                b.iter(|| codec.compress(black_box(data)))
            });
            let packed = codec.compress(&data).unwrap();
            group.bench_with_input(
                BenchmarkId::new(format!("{}_decode", name), size),
                &packed,
                |b, packed| b.iter(|| codec.decompress(black_box(packed))),
            );
        }
    }
    group.finish();
}

fn bench_block_transform(c: &mut Criterion) {
    let mut group = c.benchmark_group("block_transform");
    let data = sample_data(65536);
    for quality in [10, 50, 90] {
        let codec = BlockTransformCodec::new(Quality::new(quality).unwrap());
        group.bench_with_input(BenchmarkId::new("encode", quality), &data, |b, data| {
            b.iter(|| codec.compress(black_box(data)))
        });
    }
    group.finish();
}

fn bench_orchestrator(c: &mut Criterion) {
    let engine = Compressor::default();
    let data = sample_data(32768);
    let lossless = CompressionConfig::new(Mode::Lossless, 50, ContentClass::ImageBlock).unwrap();
    c.bench_function("orchestrator_block_lossless", |b| {
        b.iter(|| engine.compress(black_box(&data), &lossless))
    });

    let requests: Vec<(&[u8], CompressionConfig)> = (0..16).map(|_| (&data[..], lossless)).collect();
    c.bench_function("orchestrator_batch_16", |b| {
        b.iter(|| engine.compress_batch(black_box(&requests)))
    });
}

criterion_group!(benches, bench_codecs, bench_block_transform, bench_orchestrator);
criterion_main!(benches);
