#[macro_use]
extern crate criterion;

use criterion::{Criterion, Throughput};
use num_bigint::BigInt;
use std::io::Cursor;

use vc2_bitstream::autofill::autofill_and_serialise_stream;
use vc2_bitstream::fixeddict::Value;
use vc2_bitstream::io::{BitstreamReader, BitstreamWriter};
use vc2_bitstream::records;
use vc2_bitstream::syntax::deserialise_stream;
use vc2_bitstream::{dict, record, vlist, Bits};

/// Serialise a one-picture high-quality stream to bench against: 32x32
/// 4:4:4, 8x8 slices of 4x4 coefficients per component.
fn example_stream_bytes() -> Vec<u8> {
    let slices_x = 8u64;
    let slices_y = 8u64;
    let num_slices = (slices_x * slices_y) as usize;
    let coeffs_per_slice = 4 * 4;

    let coeff_list = |seed: i64| {
        Value::List(
            (0..num_slices * coeffs_per_slice)
                .map(|i| Value::from(((i as i64 % 13) - 6) * seed))
                .collect(),
        )
    };
    let per_slice = |value: Value| Value::List(vec![value; num_slices]);

    let hq_slice_array = record![records::HQ_SLICE_ARRAY;
        "prefix_bytes" => per_slice(Value::Bytes(Vec::new())),
        "qindex" => per_slice(Value::from(4u8)),
        "slice_y_length" => per_slice(Value::from(16u8)),
        "slice_c1_length" => per_slice(Value::from(16u8)),
        "slice_c2_length" => per_slice(Value::from(16u8)),
        "y_transform" => coeff_list(1),
        "c1_transform" => coeff_list(2),
        "c2_transform" => coeff_list(3),
        "y_block_padding" => per_slice(Value::Bits(Bits::new())),
        "c1_block_padding" => per_slice(Value::Bits(Bits::new())),
        "c2_block_padding" => per_slice(Value::Bits(Bits::new())),
    ];

    let mut stream = dict![
        "sequences" => vlist![dict![
            "data_units" => vlist![
                dict![
                    "parse_info" => record![records::PARSE_INFO;
                        "parse_code" => 0x00u8,
                    ],
                    "sequence_header" => record![records::SEQUENCE_HEADER;
                        "video_parameters" => record![records::SOURCE_PARAMETERS;
                            "frame_size" => record![records::FRAME_SIZE;
                                "custom_dimensions_flag" => true,
                                "frame_width" => 32u8,
                                "frame_height" => 32u8,
                            ],
                            "color_diff_sampling_format" =>
                                record![records::COLOR_DIFF_SAMPLING_FORMAT;
                                    "custom_color_diff_format_flag" => true,
                                    "color_diff_format_index" => 0u8,
                                ],
                        ],
                    ],
                ],
                dict![
                    "parse_info" => record![records::PARSE_INFO;
                        "parse_code" => 0xE8u8,
                    ],
                    "picture_parse" => dict![
                        "wavelet_transform" => dict![
                            "transform_parameters" => dict![
                                "slice_parameters" => record![records::SLICE_PARAMETERS;
                                    "slices_x" => slices_x,
                                    "slices_y" => slices_y,
                                    "slice_prefix_bytes" => 0u8,
                                    "slice_size_scaler" => 1u8,
                                ],
                            ],
                            "hq_slice_array" => hq_slice_array,
                        ],
                    ],
                ],
                dict![
                    "parse_info" => record![records::PARSE_INFO;
                        "parse_code" => 0x10u8,
                    ],
                ],
            ],
        ]],
    ];

    let mut bytes = Cursor::new(Vec::new());
    autofill_and_serialise_stream(&mut bytes, &mut stream).expect("serialise example stream");
    bytes.into_inner()
}

fn bench_deserialise(c: &mut Criterion) {
    let bytes = example_stream_bytes();
    let mut group = c.benchmark_group("deserialise");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("hq_picture_stream", |b| {
        b.iter(|| deserialise_stream(Cursor::new(bytes.clone())).unwrap())
    });
    group.finish();
}

fn bench_exp_golomb(c: &mut Criterion) {
    let mut writer = BitstreamWriter::new(Cursor::new(Vec::new())).unwrap();
    for i in 0..10_000u32 {
        writer.write_uint(&BigInt::from(i % 255)).unwrap();
    }
    writer.flush().unwrap();
    let bytes = writer.into_inner().unwrap().into_inner();

    let mut group = c.benchmark_group("exp_golomb");
    group.throughput(Throughput::Bytes(bytes.len() as u64));
    group.bench_function("read_uint_x10000", |b| {
        b.iter(|| {
            let mut reader = BitstreamReader::new(Cursor::new(bytes.clone())).unwrap();
            for _ in 0..10_000 {
                reader.read_uint().unwrap();
            }
        })
    });
    group.finish();
}

criterion_group!(benches, bench_deserialise, bench_exp_golomb);
criterion_main!(benches);
