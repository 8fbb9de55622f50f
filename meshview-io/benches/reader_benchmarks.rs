//! Benchmarks for parsing binary STL and legacy VTK meshes

use byteorder::{LittleEndian, WriteBytesExt};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use meshview_io::{stl::parse_stl, vtk_legacy::parse_mesh};

/// Binary STL of a triangulated grid with `n * n * 2` facets
fn generate_stl(n: usize) -> Vec<u8> {
    let mut bytes = vec![0u8; 80];
    bytes.write_u32::<LittleEndian>((n * n * 2) as u32).unwrap();
    for i in 0..n {
        for j in 0..n {
            let (x, y) = (i as f32, j as f32);
            let quads = [
                [[x, y, 0.0], [x + 1.0, y, 0.0], [x + 1.0, y + 1.0, 0.0]],
                [[x, y, 0.0], [x + 1.0, y + 1.0, 0.0], [x, y + 1.0, 0.0]],
            ];
            for triangle in quads {
                for v in [0.0f32, 0.0, 1.0] {
                    bytes.write_f32::<LittleEndian>(v).unwrap();
                }
                for corner in triangle {
                    for v in corner {
                        bytes.write_f32::<LittleEndian>(v).unwrap();
                    }
                }
                bytes.write_u16::<LittleEndian>(0).unwrap();
            }
        }
    }
    bytes
}

/// ASCII legacy VTK point cloud with scalars
fn generate_vtk(num_points: usize) -> Vec<u8> {
    let mut text = format!(
        "# vtk DataFile Version 3.0\nbench\nASCII\nDATASET POLYDATA\nPOINTS {} float\n",
        num_points
    );
    for i in 0..num_points {
        let t = i as f32 * 0.1;
        text.push_str(&format!("{} {} {}\n", t.sin(), t.cos(), t * 0.01));
    }
    text.push_str(&format!("VERTICES {} {}\n", num_points, num_points * 2));
    for i in 0..num_points {
        text.push_str(&format!("1 {}\n", i));
    }
    text.push_str(&format!("POINT_DATA {}\nSCALARS s float 1\nLOOKUP_TABLE default\n", num_points));
    for i in 0..num_points {
        text.push_str(&format!("{}\n", i));
    }
    text.into_bytes()
}

fn benchmark_stl(c: &mut Criterion) {
    let mut group = c.benchmark_group("stl_binary");
    for n in [16usize, 64, 256] {
        let bytes = generate_stl(n);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(n * n * 2), &bytes, |b, bytes| {
            b.iter(|| parse_stl(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

fn benchmark_vtk(c: &mut Criterion) {
    let mut group = c.benchmark_group("vtk_legacy_ascii");
    for size in [1_000usize, 10_000, 100_000] {
        let bytes = generate_vtk(size);
        group.throughput(Throughput::Bytes(bytes.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &bytes, |b, bytes| {
            b.iter(|| parse_mesh(black_box(bytes)).unwrap())
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_stl, benchmark_vtk);
criterion_main!(benches);
