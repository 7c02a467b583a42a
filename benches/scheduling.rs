#![allow(unused)]
extern crate mipsweave;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use mipsweave::prelude::*;
use std::hint::black_box;

/// Builds a straight-line block of `len` instructions with load/use chains, memory
/// traffic and an accumulator round-trip every few instructions, ending in `jr $ra`.
fn create_block(len: usize) -> Vec<Instruction> {
    let regs = [Register::T0, Register::T1, Register::T2, Register::T3];
    let mut instructions = Vec::with_capacity(len + 2);
    for i in 0..len {
        let r = regs[i % regs.len()];
        let instr = match i % 5 {
            0 => Instruction::lw(r, (i as i64 % 64) * 4, Register::A0),
            1 => Instruction::alu(Opcode::Addu, r, r, regs[(i + 1) % regs.len()]),
            2 => Instruction::mul_div(Opcode::Mult, r, Register::A1),
            3 => Instruction::mflo(r),
            _ => Instruction::sw(r, (i as i64 % 64) * 4, Register::A2),
        };
        instructions.push(instr.at(0x400000 + i as u64 * 4));
    }
    instructions.push(Instruction::jr(Register::Ra).at(0x400000 + len as u64 * 4));
    instructions.push(Instruction::nop().at(0x400004 + len as u64 * 4));
    instructions
}

/// Interleaves `count` synthetic definitions and uses into an original block.
fn create_expanded_block(len: usize, count: u32) -> Vec<Instruction> {
    let mut block = create_block(len);
    let tail = block.split_off(len);
    for id in 0..count {
        block.push(Instruction::addiu(SyntheticReg(id), Register::A3, i64::from(id)));
    }
    for id in 0..count {
        block.push(Instruction::sw(SyntheticReg(id), i64::from(id) * 4, Register::A3));
    }
    block.extend(tail);
    block
}

fn bench_hazard_graph(c: &mut Criterion) {
    let mut group = c.benchmark_group("hazard_graph");
    for len in [16usize, 64, 256] {
        let block = create_block(len);
        group.throughput(Throughput::Elements(block.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &block, |b, block| {
            b.iter(|| {
                let graph = DependencyGraphBuilder::new().build(black_box(block)).unwrap();
                black_box(graph)
            });
        });
    }
    group.finish();
}

fn bench_list_scheduler(c: &mut Criterion) {
    let latencies = MipsLatencies;
    let scheduler = ListScheduler::new(&latencies);

    let mut group = c.benchmark_group("list_scheduler");
    for len in [16usize, 64, 256] {
        let block = create_block(len);
        group.throughput(Throughput::Elements(block.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(len), &block, |b, block| {
            b.iter(|| black_box(scheduler.reorder(black_box(block)).unwrap()));
        });
    }
    group.finish();
}

fn bench_register_allocation(c: &mut Criterion) {
    let naive = TransformConfig::naive();
    let linear = TransformConfig::linear_scan();
    let block = create_expanded_block(64, 6);
    let pressured = create_expanded_block(64, 12);

    let mut group = c.benchmark_group("register_allocation");
    group.throughput(Throughput::Elements(block.len() as u64));
    group.bench_function("naive", |b| {
        b.iter(|| black_box(RegisterAllocator::new(&naive).allocate(black_box(&block)).unwrap()));
    });
    group.bench_function("linear_scan", |b| {
        b.iter(|| black_box(RegisterAllocator::new(&linear).allocate(black_box(&block)).unwrap()));
    });
    group.bench_function("linear_scan_spilling", |b| {
        b.iter(|| {
            black_box(
                RegisterAllocator::new(&linear)
                    .allocate(black_box(&pressured))
                    .unwrap(),
            )
        });
    });
    group.finish();
}

criterion_group!(
    benches,
    bench_hazard_graph,
    bench_list_scheduler,
    bench_register_allocation
);
criterion_main!(benches);
