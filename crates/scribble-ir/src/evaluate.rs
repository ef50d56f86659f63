//! One-off evaluation of constant expressions.

use rustc_hash::FxHashMap;

use scribble_bind::BoundExpr;
use scribble_source::TokenLocation;
use scribble_types::Datum;

use crate::error::{LoweringError, LoweringResult};
use crate::generate::FunctionBuilder;
use crate::instruction::{Instruction, Label, Operation};

/// Lower `expr` on its own and evaluate it.
///
/// Only literals, operators, casts and conditionals are constant; variables
/// and calls are rejected with [`LoweringError::NotConstant`].
pub fn evaluate(expr: &BoundExpr) -> LoweringResult<Datum> {
    let mut builder = FunctionBuilder::new(None);
    builder.lower_expr(expr)?;
    let code = builder.finish();
    let value = run(&code, &expr.location)?;
    log::trace!(target: "ir", "evaluated {} instruction(s) to {}", code.len(), value);
    Ok(value)
}

fn run(code: &[Instruction], location: &TokenLocation) -> LoweringResult<Datum> {
    let labels: FxHashMap<Label, usize> = code
        .iter()
        .enumerate()
        .filter_map(|(index, ins)| match ins.op {
            Operation::Label(label) => Some((label, index)),
            _ => None,
        })
        .collect();
    let jump = |label: &Label, ins: &Instruction| {
        labels
            .get(label)
            .copied()
            .ok_or_else(|| LoweringError::internal(format!("undefined label {}", label), &ins.location))
    };

    let mut stack: Vec<Datum> = Vec::new();
    let mut pc = 0;
    while let Some(ins) = code.get(pc) {
        pc += 1;
        let eval = |source| LoweringError::Evaluation {
            source,
            location: ins.location.clone(),
        };
        match &ins.op {
            Operation::PushConst(datum) => stack.push(datum.clone()),
            Operation::Unary(op) => {
                let operand = pop(&mut stack, ins)?;
                stack.push(Datum::unary(*op, &operand).map_err(eval)?);
            }
            Operation::Binary(op) => {
                let rhs = pop(&mut stack, ins)?;
                let lhs = pop(&mut stack, ins)?;
                stack.push(Datum::binary(*op, &lhs, &rhs).map_err(eval)?);
            }
            Operation::Cast(ty) => {
                let value = pop(&mut stack, ins)?;
                stack.push(value.cast(*ty).map_err(eval)?);
            }
            Operation::Jump(label) => pc = jump(label, ins)?,
            Operation::JumpIfFalse(label) => {
                if !pop(&mut stack, ins)?.truthy() {
                    pc = jump(label, ins)?;
                }
            }
            Operation::JumpIfTrue(label) => {
                if pop(&mut stack, ins)?.truthy() {
                    pc = jump(label, ins)?;
                }
            }
            Operation::Label(_) => {}
            Operation::Pop => {
                pop(&mut stack, ins)?;
            }
            Operation::PushLocal(_) | Operation::PushGlobal(_) => {
                return Err(LoweringError::not_constant("a variable", &ins.location))
            }
            other => return Err(LoweringError::not_constant(format!("'{}'", other.mnemonic()), &ins.location)),
        }
    }
    stack
        .pop()
        .ok_or_else(|| LoweringError::internal("expression left no value", location))
}

fn pop(stack: &mut Vec<Datum>, ins: &Instruction) -> LoweringResult<Datum> {
    stack
        .pop()
        .ok_or_else(|| LoweringError::internal("operand stack underflow", &ins.location))
}
