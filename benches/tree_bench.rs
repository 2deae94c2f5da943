use criterion::{black_box, criterion_group, criterion_main, Criterion};
use shrinkit::archive::{Archive, ArchiveOptions};
use shrinkit::master::MasterHeader;
use shrinkit::record::{ArchiveRecord, Fork};
use shrinkit::thread::{ThreadHeader, ThreadId};
use shrinkit::entry::EntryHeader;
use shrinkit::tree::HierarchyBuilder;

fn records(count: usize) -> Vec<ArchiveRecord> {
    (0..count)
        .map(|i| ArchiveRecord {
            index:     i,
            filename:  format!("DIR{}:SUB{}:FILE{i}", i % 16, i % 7),
            separator: b':',
            data_fork: Some(Fork { uncompressed_size: i as u64, compressed_size: 0, descriptor: None }),
            ..ArchiveRecord::default()
        })
        .collect()
}

/// Uncompressed archive with `count` small files.
fn archive_bytes(count: usize) -> Vec<u8> {
    let mut body = Vec::new();
    let header = EntryHeader {
        version:       3,
        file_sys_id:   1,
        file_sys_info: b':' as u16,
        access:        0xE3,
        file_type:     0x06,
        storage_type:  1,
        ..EntryHeader::default()
    };
    for i in 0..count {
        let name = format!("DIR{}:FILE{i}", i % 16);
        let data = vec![i as u8; 256];
        let threads = [
            ThreadHeader::new(ThreadId::Filename, 0, name.len() as u32, name.len() as u32),
            ThreadHeader::new(ThreadId::DataFork, 0, data.len() as u32, data.len() as u32),
        ];
        header.write(&threads, &mut body).unwrap();
        body.extend(name.as_bytes());
        body.extend(&data);
    }
    let mut bytes = Vec::new();
    MasterHeader::new(count as u32, (48 + body.len()) as u32).write(&mut bytes).unwrap();
    bytes.extend(body);
    bytes
}

fn bench_hierarchy(c: &mut Criterion) {
    let recs = records(10_000);
    c.bench_function("build_tree_10k", |b| b.iter(|| HierarchyBuilder::build(black_box(&recs))));
}

fn bench_build_model(c: &mut Criterion) {
    let bytes = archive_bytes(2_000);
    c.bench_function("open_and_build_model_2k", |b| {
        b.iter(|| {
            let mut ar = Archive::from_bytes(black_box(bytes.clone()), ArchiveOptions::default()).unwrap();
            ar.build_model().unwrap().len()
        })
    });
}

criterion_group!(benches, bench_hierarchy, bench_build_model);
criterion_main!(benches);
