use criterion::{black_box, criterion_group, criterion_main, Criterion};
use tcl::script::parser::{commands_complete, parse_script};
use tcl::script::Interpreter;

fn make_script(repeats: usize) -> String {
    let chunk = "set total [expr {$total + $i * 2}]\n\
                 if {$total > 100} {set big \"yes: $total\"} else {set big {no}}\n\
                 # a comment line\n";
    format!("set total 0\nset i 3\n{}", chunk.repeat(repeats))
}

fn bench_parse(c: &mut Criterion) {
    let small = make_script(10);
    let large = make_script(1000);

    let mut g = c.benchmark_group("tokenizer");
    g.bench_function("parse_small", |b| b.iter(|| parse_script(black_box(&small))));
    g.bench_function("parse_large", |b| b.iter(|| parse_script(black_box(&large))));
    g.bench_function("complete_large", |b| {
        b.iter(|| commands_complete(black_box(&large)))
    });
    g.finish();
}

fn bench_expr(c: &mut Criterion) {
    let mut g = c.benchmark_group("expr");

    g.bench_function("arith", |b| {
        let mut interp = Interpreter::new();
        b.iter(|| interp.expr(black_box("(3 + 4) * 2 - 7 / -2 % 5 << 1")))
    });
    g.bench_function("vars_and_functions", |b| {
        let mut interp = Interpreter::new();
        interp.set_var("x", "12.5").unwrap();
        interp.set_var("n", "7").unwrap();
        b.iter(|| interp.expr(black_box("sqrt($x * $x) + pow($n, 2) > 10 ? int($x) : $n")))
    });
    g.bench_function("script_loop", |b| {
        let mut interp = Interpreter::new();
        b.iter(|| interp.eval(black_box("set i 0; while {$i < 100} {incr i}")))
    });
    g.finish();
}

criterion_group!(benches, bench_parse, bench_expr);
criterion_main!(benches);
