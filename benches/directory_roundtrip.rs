// Copyright 2022 MaidSafe.net limited.
//
// This SAFE Network Software is licensed to you under The General Public License (GPL), version 3.
// Unless required by applicable law or agreed to in writing, the SAFE Network Software distributed
// under the GPL Licence is distributed on an "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied. Please review the Licences for the specific language governing
// permissions and limitations relating to use of the SAFE Network Software.

use criterion::Throughput;
use criterion::{criterion_group, criterion_main, Criterion};
use sn_drive::{Directory, Identity, MetaData};

fn directory_of_size(n: usize) -> Directory {
    let mut dir = Directory::empty(Identity::random());
    for i in 0..n {
        dir.add_child(MetaData::new(format!("file-{}.txt", i), false))
            .expect("add");
    }
    dir
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("directory_roundtrip");

    for size in [8usize, 64, 512] {
        let dir = directory_of_size(size);
        let bytes = dir.serialise().expect("serialise");
        group.throughput(Throughput::Elements(size as u64));

        group.bench_with_input(format!("serialise/{}", size), &dir, |b, dir| {
            b.iter(|| dir.serialise().expect("serialise"));
        });

        group.bench_with_input(format!("parse/{}", size), &bytes, |b, bytes| {
            b.iter(|| Directory::from_serialised(bytes).expect("parse"));
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
