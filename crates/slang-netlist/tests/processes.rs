//! Procedural lowering: staging-wire commits, branch priority encoding,
//! case dispatch and `$display` triggers.

mod common;

use common::*;
use slang_netlist::ast::{EdgeKind, PortDirection, Type};
use slang_netlist::rtlil::{Const, SigSpec, State, SyncKind};
use slang_netlist::LowerError;

#[test]
fn blocking_vs_nonblocking_swap() {
    let mut tm = TestModule::new("top");
    let clk = tm.port("clk", PortDirection::In, Type::logic(1));
    let a = tm.var("a", Type::logic(1));
    let b = tm.var("b", Type::logic(1));
    tm.always_ff(
        EdgeKind::PosEdge,
        clk,
        seq_block(vec![
            assign_stmt(tm.read(a), tm.read(b), false),
            assign_stmt(tm.read(b), tm.read(a), false),
        ]),
    );

    let design = tm.lower();
    let m = design.module("\\top").unwrap();

    assert_eq!(m.processes.len(), 1);
    let proc = &m.processes[0];

    // one positive-edge sync on clk
    assert_eq!(proc.syncs.len(), 1);
    assert_eq!(proc.syncs[0].kind, SyncKind::Posedge);
    assert_eq!(proc.syncs[0].signal, wire_sig(m, "top.clk"));

    // two staging wires, one per written bit
    let staging = staging_wires(m);
    assert_eq!(staging.len(), 2);

    // root case defaults: staging <- original, in destination order
    let root = proc.case(proc.root);
    assert_eq!(root.actions.len(), 2);
    assert_eq!(root.actions[0].1, wire_sig(m, "top.a"));
    assert_eq!(root.actions[1].1, wire_sig(m, "top.b"));
    for (lhs, _) in &root.actions {
        let wb = lhs.bit(0).wire_bit().unwrap();
        assert!(m.wire_data(wb.wire).name.ends_with("$staging"));
    }

    // sync commits: original <- staging
    assert_eq!(proc.syncs[0].actions.len(), 2);
    assert_eq!(proc.syncs[0].actions[0].0, wire_sig(m, "top.a"));
    assert_eq!(proc.syncs[0].actions[0].1, root.actions[0].0);
    assert_eq!(proc.syncs[0].actions[1].0, wire_sig(m, "top.b"));
    assert_eq!(proc.syncs[0].actions[1].1, root.actions[1].0);

    // the statement-level case: a's stage reads the original b and b's
    // stage reads the original a (the defining non-blocking property)
    let top_switch = proc.switch(root.switches[0]);
    let stmt_case = proc.case(top_switch.cases[0]);
    assert_eq!(stmt_case.actions.len(), 2);
    assert_eq!(stmt_case.actions[0].0, root.actions[0].0);
    assert_eq!(stmt_case.actions[0].1, wire_sig(m, "top.b"));
    assert_eq!(stmt_case.actions[1].0, root.actions[1].0);
    assert_eq!(stmt_case.actions[1].1, wire_sig(m, "top.a"));
}

#[test]
fn if_else_priority() {
    let mut tm = TestModule::new("top");
    let s = tm.port("s", PortDirection::In, Type::logic(1));
    let a = tm.port("a", PortDirection::In, Type::logic(1));
    let b = tm.port("b", PortDirection::In, Type::logic(1));
    let y = tm.port("y", PortDirection::Out, Type::logic(1));
    tm.always_comb(seq_block(vec![
        assign_stmt(tm.read(y), lit(0, 1), true),
        if_stmt(
            tm.read(s),
            assign_stmt(tm.read(y), tm.read(a), true),
            Some(assign_stmt(tm.read(y), tm.read(b), true)),
        ),
    ]));

    let design = tm.lower();
    let m = design.module("\\top").unwrap();
    let proc = &m.processes[0];

    // level-sensitive process
    assert_eq!(proc.syncs.len(), 1);
    assert_eq!(proc.syncs[0].kind, SyncKind::Always);

    let root = proc.case(proc.root);
    let top_switch = proc.switch(root.switches[0]);
    let c0 = proc.case(top_switch.cases[0]);

    // statement case: the unconditional y = 0, then the merge default of
    // the if (shadow <- pre-branch value, still the constant 0)
    let zero = SigSpec::from(Const::from_int(0, 1));
    assert_eq!(c0.actions.len(), 2);
    assert_eq!(c0.actions[0].1, zero);
    assert_eq!(c0.actions[1].1, zero);
    assert_ne!(c0.actions[0].0, c0.actions[1].0);

    // dispatch is the reduce_bool of s
    assert_eq!(c0.switches.len(), 2);
    let if_switch = proc.switch(c0.switches[0]);
    let rb = m
        .cells
        .iter()
        .find(|c| c.kind == "reduce_bool")
        .expect("reduce_bool cell");
    assert_eq!(rb.ports["A"], wire_sig(m, "top.s"));
    assert_eq!(if_switch.signal, rb.ports["Y"]);

    // then-arm matches 1, else-arm is the default
    assert_eq!(if_switch.cases.len(), 2);
    let then_case = proc.case(if_switch.cases[0]);
    let else_case = proc.case(if_switch.cases[1]);
    assert_eq!(then_case.compare, vec![SigSpec::from(State::S1)]);
    assert!(else_case.compare.is_empty());
    assert_eq!(then_case.actions[0].1, wire_sig(m, "top.a"));
    assert_eq!(else_case.actions[0].1, wire_sig(m, "top.b"));
    // branch overrides of the merge shadow
    assert_eq!(then_case.actions[1].0, c0.actions[1].0);
    assert_eq!(then_case.actions[1].1, wire_sig(m, "top.a"));
    assert_eq!(else_case.actions[1].0, c0.actions[1].0);
    assert_eq!(else_case.actions[1].1, wire_sig(m, "top.b"));

    // the follow-up dummy switch is present but empty
    let dummy = proc.switch(c0.switches[1]);
    assert!(dummy.signal.is_empty());
    assert_eq!(dummy.cases.len(), 1);
    let dummy_case = proc.case(dummy.cases[0]);
    assert!(dummy_case.compare.is_empty());
    assert!(dummy_case.actions.is_empty());
    assert!(dummy_case.switches.is_empty());

    // staging default and the level-sensitive commit
    assert_eq!(root.actions.len(), 1);
    assert_eq!(root.actions[0].1, wire_sig(m, "top.y"));
    assert_eq!(proc.syncs[0].actions, vec![(
        wire_sig(m, "top.y"),
        root.actions[0].0.clone(),
    )]);
}

#[test]
fn case_with_default() {
    let mut tm = TestModule::new("top");
    let sel = tm.port("sel", PortDirection::In, Type::logic(2));
    let a = tm.port("a", PortDirection::In, Type::logic(1));
    let b = tm.port("b", PortDirection::In, Type::logic(1));
    let c = tm.port("c", PortDirection::In, Type::logic(1));
    let y = tm.port("y", PortDirection::Out, Type::logic(1));
    tm.always_comb(case_stmt(
        tm.read(sel),
        vec![
            (vec![lit(0b00, 2)], assign_stmt(tm.read(y), tm.read(a), true)),
            (vec![lit(0b01, 2)], assign_stmt(tm.read(y), tm.read(b), true)),
        ],
        Some(assign_stmt(tm.read(y), tm.read(c), true)),
    ));

    let design = tm.lower();
    let m = design.module("\\top").unwrap();
    let proc = &m.processes[0];

    let root = proc.case(proc.root);
    let c0 = proc.case(proc.switch(root.switches[0]).cases[0]);
    let case_switch = proc.switch(c0.switches[0]);

    // dispatches on sel itself
    assert_eq!(case_switch.signal, wire_sig(m, "top.sel"));
    assert_eq!(case_switch.cases.len(), 3);

    let arm0 = proc.case(case_switch.cases[0]);
    let arm1 = proc.case(case_switch.cases[1]);
    let armd = proc.case(case_switch.cases[2]);
    assert_eq!(arm0.compare, vec![SigSpec::from(Const::from_int(0b00, 2))]);
    assert_eq!(arm1.compare, vec![SigSpec::from(Const::from_int(0b01, 2))]);
    assert!(armd.compare.is_empty());
    assert_eq!(arm0.actions[0].1, wire_sig(m, "top.a"));
    assert_eq!(arm1.actions[0].1, wire_sig(m, "top.b"));
    assert_eq!(armd.actions[0].1, wire_sig(m, "top.c"));
}

#[test]
fn display_under_condition() {
    let mut tm = TestModule::new("top");
    let clk = tm.port("clk", PortDirection::In, Type::logic(1));
    let en = tm.port("en", PortDirection::In, Type::logic(1));
    let x = tm.port("x", PortDirection::In, Type::logic(8));
    tm.always_ff(
        EdgeKind::PosEdge,
        clk,
        if_stmt(
            tm.read(en),
            display_stmt(vec![string_lit("x=%d"), tm.read(x)]),
            None,
        ),
    );

    let design = tm.lower();
    let m = design.module("\\top").unwrap();
    let proc = &m.processes[0];

    let print = m
        .cells
        .iter()
        .find(|c| c.kind == "print")
        .expect("print cell");
    assert_eq!(print.parameters["TRG_ENABLE"], Const::from_bool(true));
    assert_eq!(print.parameters["TRG_WIDTH"], Const::from_int(1, 32));
    assert_eq!(
        print.parameters["TRG_POLARITY"],
        Const::Bits(vec![State::S1])
    );
    assert_eq!(print.parameters["PRIORITY"], Const::from_int(-1, 32));
    assert_eq!(
        print.parameters["FORMAT"],
        Const::Str("x={8:du}\n".to_string())
    );
    assert_eq!(print.ports["TRG"], wire_sig(m, "top.clk"));
    assert_eq!(print.ports["ARGS"], wire_sig(m, "top.x"));

    // the enable is zeroed in the root case and raised in the then-branch
    let enable = print.ports["EN"].clone();
    assert_eq!(enable.len(), 1);
    let root = proc.case(proc.root);
    assert!(root
        .actions
        .iter()
        .any(|(lhs, rhs)| *lhs == enable && *rhs == SigSpec::from(State::S0)));
    let c0 = proc.case(proc.switch(root.switches[0]).cases[0]);
    let then_case = proc.case(proc.switch(c0.switches[0]).cases[0]);
    assert!(then_case
        .actions
        .iter()
        .any(|(lhs, rhs)| *lhs == enable && *rhs == SigSpec::from(State::S1)));
}

#[test]
fn blocking_write_is_visible_to_later_reads() {
    let mut tm = TestModule::new("top");
    let b = tm.port("b", PortDirection::In, Type::logic(1));
    let a = tm.var("a", Type::logic(1));
    let c = tm.var("c", Type::logic(1));
    tm.always_comb(seq_block(vec![
        assign_stmt(tm.read(a), tm.read(b), true),
        assign_stmt(tm.read(c), tm.read(a), true),
    ]));

    let design = tm.lower();
    let m = design.module("\\top").unwrap();
    let proc = &m.processes[0];
    let root = proc.case(proc.root);
    let c0 = proc.case(proc.switch(root.switches[0]).cases[0]);

    // c = a reads through the blocking substitution, i.e. the original b
    assert_eq!(c0.actions.len(), 2);
    assert_eq!(c0.actions[0].1, wire_sig(m, "top.b"));
    assert_eq!(c0.actions[1].1, wire_sig(m, "top.b"));
}

#[test]
fn mixed_assignment_styles_are_rejected() {
    let mut tm = TestModule::new("top");
    let clk = tm.port("clk", PortDirection::In, Type::logic(1));
    let b = tm.port("b", PortDirection::In, Type::logic(1));
    let a = tm.var("a", Type::logic(1));
    tm.always_ff(
        EdgeKind::PosEdge,
        clk,
        seq_block(vec![
            assign_stmt(tm.read(a), tm.read(b), true),
            assign_stmt(tm.read(a), tm.read(b), false),
        ]),
    );
    assert!(matches!(
        tm.lower_err(),
        LowerError::MixedAssignment { .. }
    ));
}

#[test]
fn negedge_and_both_edge_sensitivities() {
    let mut tm = TestModule::new("top");
    let clk = tm.port("clk", PortDirection::In, Type::logic(1));
    let d = tm.port("d", PortDirection::In, Type::logic(1));
    let q = tm.var("q", Type::logic(1));
    tm.always_ff(
        EdgeKind::NegEdge,
        clk,
        assign_stmt(tm.read(q), tm.read(d), false),
    );

    let design = tm.lower();
    let m = design.module("\\top").unwrap();
    assert_eq!(m.processes[0].syncs[0].kind, SyncKind::Negedge);
}
