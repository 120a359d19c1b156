use crate::{
    bytecode::image::{Instr, render_instr},
    runtime::script::{Script, ThreadHandle},
};

use super::Vm;

impl Vm {
    pub(super) fn trace_instruction(&self, thread: ThreadHandle, ip: usize, instr: &Instr) {
        let Ok(script) = self.script(thread) else {
            return;
        };
        for line in trace_lines(script, thread, ip, instr) {
            println!("{}", line);
        }
    }
}

/// The instruction about to run, the slots pushed on top of the current
/// frame, then up to eight of the frame's own slots below its base.
pub(super) fn trace_lines(
    script: &Script,
    thread: ThreadHandle,
    ip: usize,
    instr: &Instr,
) -> Vec<String> {
    let mut lines = vec![format!(
        "T{} IP={:04} {}",
        thread.0,
        ip,
        render_instr(instr, &script.funcs, &script.host_calls)
    )];

    let live = script.stack.live();
    let base = script.stack.frame_base().min(live.len());
    let pushed: Vec<String> = live[base..].iter().map(|value| value.to_string()).collect();
    lines.push(format!("  stack: [{}]", pushed.join(", ")));

    let frame_start = base.saturating_sub(8);
    if base > frame_start {
        let frame: Vec<String> = live[frame_start..base]
            .iter()
            .map(|value| value.to_string())
            .collect();
        lines.push(format!(
            "  frame[{}..{}]: [{}]",
            frame_start,
            base,
            frame.join(", ")
        ));
    }
    if script.paused {
        lines.push(format!("  paused until {}ms", script.pause_end));
    }
    lines
}
