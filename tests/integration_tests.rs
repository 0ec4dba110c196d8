use std::sync::mpsc;
use visual_debugger::debugger::{Command, DebugContext, PromptDetector, StepState};
use visual_debugger::SessionError;

const INFO_FUNCTIONS: &str = "All defined functions:

File main.c:
5:\tint main(void);
3:\tstatic int helper(int);

Non-debugging symbols:
0x0000000000001000  _init
0x0000000000001030  strlen@plt
(gdb) ";

fn context() -> DebugContext<Vec<u8>> {
    DebugContext::new(Vec::new(), PromptDetector::new(&["(visual-gdb) ", "(gdb) "]))
}

fn written(ctx: &DebugContext<Vec<u8>>) -> String {
    String::from_utf8_lossy(ctx.channel().input().unwrap()).into_owned()
}

/// Feed `text` in pieces of at most `size` characters, collecting what would be displayed.
fn feed_in_pieces(ctx: &mut DebugContext<Vec<u8>>, text: &str, size: usize) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut shown = String::new();
    for piece in chars.chunks(size) {
        let piece: String = piece.iter().collect();
        for text in ctx.on_output(&piece) {
            shown.push_str(&text);
        }
    }
    shown
}

#[cfg(test)]
mod channel_tests {
    use super::*;

    #[test]
    fn test_second_foreground_command_is_busy() {
        let mut ctx = context();
        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::new("print x", true), Some(tx)).unwrap();

        let err = ctx.submit(Command::new("next", true), None).unwrap_err();
        assert!(matches!(err, SessionError::Busy(ref text) if text == "print x"));
        assert_eq!(written(&ctx), "print x\n");

        ctx.on_output("$1 = 3\n(gdb) ");
        let response = rx.recv().unwrap().unwrap();
        assert_eq!(response.text, "$1 = 3\n");
        assert_eq!(response.command.text, "print x");
    }

    #[test]
    fn test_split_output_completes_exactly_once() {
        let output = "$1 = {x = 1, y = 2}\n(visual-gdb) ";
        let total = output.chars().count();

        for size in [1, 2, 5, total] {
            let mut ctx = context();
            let (tx, rx) = mpsc::channel();
            ctx.submit(Command::new("print p", true), Some(tx)).unwrap();

            let shown = feed_in_pieces(&mut ctx, output, size);

            let responses: Vec<_> = rx.try_iter().collect();
            assert_eq!(responses.len(), 1, "piece size {}", size);
            let response = responses.into_iter().next().unwrap().unwrap();
            assert_eq!(response.text, "$1 = {x = 1, y = 2}\n", "piece size {}", size);
            // The prompt never reaches the display, however it was split.
            assert_eq!(shown, "$1 = {x = 1, y = 2}\n", "piece size {}", size);
            assert!(ctx.is_idle());
        }
    }

    #[test]
    fn test_prompt_text_mid_output_does_not_complete() {
        let mut ctx = context();
        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::new("print s", false), Some(tx)).unwrap();

        ctx.on_output("$1 = \"(gdb) is the prompt\"\n");
        assert!(rx.try_recv().is_err());
        assert!(!ctx.is_idle());

        ctx.on_output("(gdb) ");
        assert_eq!(rx.recv().unwrap().unwrap().text, "$1 = \"(gdb) is the prompt\"\n");
    }

    #[test]
    fn test_startup_waits_for_banner_prompt() {
        let mut ctx = context();
        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::startup(), Some(tx)).unwrap();
        assert_eq!(written(&ctx), "");

        ctx.on_output("Reading symbols from a.out...\n");
        ctx.on_output("(gdb) ");
        let response = rx.recv().unwrap().unwrap();
        assert_eq!(response.text, "Reading symbols from a.out...\n");
    }

    #[test]
    fn test_step_into_library_code_is_skipped() {
        let mut ctx = context();
        ctx.submit(Command::new("info functions", false), None).unwrap();
        ctx.on_output(INFO_FUNCTIONS);
        assert!(ctx.catalogue().contains("helper"));
        assert!(!ctx.catalogue().contains("strlen"));

        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::new("step", true), Some(tx)).unwrap();
        let shown = ctx.on_output("0x00007ffff7e4a0c0 in strlen ()\n12\t  n = strlen(s);\n(gdb) ");
        assert!(shown.is_empty(), "library entry must stay hidden: {:?}", shown);

        let step = rx.recv().unwrap().unwrap();
        assert!(!step.display);
        assert_eq!(
            ctx.step_state(),
            StepState::AwaitingSkipDecision {
                finish_from: Some(12)
            }
        );
        assert_eq!(ctx.channel().in_flight().map(|c| c.text.as_str()), Some("finish"));

        // The queued finish owns the slot; a user command has to wait.
        assert!(matches!(
            ctx.submit(Command::new("print n", true), None),
            Err(SessionError::Busy(_))
        ));

        let shown = ctx.on_output(
            "Run till exit from #0  0x00007ffff7e4a0c0 in strlen ()\nmain () at main.c:12\n12\t  n = strlen(s);\n(gdb) ",
        );
        assert!(shown.is_empty());
        assert_eq!(ctx.channel().in_flight().map(|c| c.text.as_str()), Some("next"));

        let shown = ctx.on_output("13\t  return n;\n(gdb) ");
        assert_eq!(shown.concat(), "13\t  return n;\n");
        assert!(ctx.is_idle());
        assert_eq!(ctx.step_state(), StepState::Idle);
        assert_eq!(written(&ctx), "info functions\nstep\nfinish\nnext\n");

        ctx.submit(Command::new("print n", true), None).unwrap();
    }

    #[test]
    fn test_finish_elsewhere_shows_its_output() {
        let mut ctx = context();
        ctx.submit(Command::new("info functions", false), None).unwrap();
        ctx.on_output(INFO_FUNCTIONS);

        ctx.submit(Command::new("step", true), None).unwrap();
        ctx.on_output("0x1000 in callback_runner (f=0x1189)\n40\t  run(cb);\n(gdb) ");
        let shown = ctx.on_output("Run till exit\nhelper (x=2) at main.c:4\n4\t  return x;\n(gdb) ");
        assert_eq!(shown.concat(), "Run till exit\nhelper (x=2) at main.c:4\n4\t  return x;\n");
        assert!(ctx.is_idle());
        assert_eq!(written(&ctx), "info functions\nstep\nfinish\n");
    }

    #[test]
    fn test_step_within_known_code_is_shown() {
        let mut ctx = context();
        ctx.submit(Command::new("info functions", false), None).unwrap();
        ctx.on_output(INFO_FUNCTIONS);

        ctx.submit(Command::new("step", true), None).unwrap();
        // Held back until complete.
        assert!(ctx.on_output("helper (x=1) at main.c:4\n").is_empty());
        let shown = ctx.on_output("4\t  return x;\n(gdb) ");
        assert_eq!(shown.concat(), "helper (x=1) at main.c:4\n4\t  return x;\n");
        assert_eq!(ctx.step_state(), StepState::Idle);
    }

    #[test]
    fn test_exit_is_detected_and_reset_by_run() {
        let mut ctx = context();
        ctx.submit(Command::new("continue", true), None).unwrap();
        ctx.on_output("Continuing.\n[Inferior 1 (process 4242) exited normally]\n(gdb) ");
        assert!(ctx.has_exited());

        ctx.submit(Command::new("run", true), None).unwrap();
        assert!(!ctx.has_exited());
    }

    #[test]
    fn test_background_commands_run_in_order() {
        let mut ctx = context();
        ctx.submit(Command::new("print a", false), None).unwrap();
        ctx.enqueue(Command::new("print b", false)).unwrap();
        ctx.enqueue(Command::new("print c", false)).unwrap();
        assert_eq!(written(&ctx), "print a\n");

        ctx.on_output("$1 = 1\n(gdb) ");
        assert_eq!(written(&ctx), "print a\nprint b\n");
        ctx.on_output("$2 = 2\n(gdb) ");
        ctx.on_output("$3 = 3\n(gdb) ");
        assert_eq!(written(&ctx), "print a\nprint b\nprint c\n");
        assert!(ctx.is_idle());
    }

    #[test]
    fn test_prompt_space_after_dispatch_is_not_output() {
        let mut ctx = context();
        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::new("print a", true), Some(tx)).unwrap();
        ctx.enqueue(Command::new("next", true)).unwrap();

        let shown = ctx.on_output("$1 = 1\n(gdb)");
        assert_eq!(shown.concat(), "$1 = 1\n");
        assert_eq!(rx.recv().unwrap().unwrap().text, "$1 = 1\n");
        assert_eq!(ctx.channel().in_flight().map(|c| c.text.as_str()), Some("next"));

        // The prompt's trailing space arrives with `next` already in flight.
        assert!(ctx.on_output(" ").is_empty());
        let shown = ctx.on_output("5\t  x++;\n(gdb) ");
        assert_eq!(shown.concat(), "5\t  x++;\n");
        assert!(ctx.is_idle());
    }

    #[test]
    fn test_prompt_space_with_next_output_is_dropped() {
        let mut ctx = context();
        ctx.submit(Command::new("print a", false), None).unwrap();
        ctx.enqueue(Command::new("print b", true)).unwrap();
        assert!(ctx.on_output("$1 = 1\n(gdb)").is_empty());

        let shown = ctx.on_output(" $2 = 2\n(gdb) ");
        assert_eq!(shown.concat(), "$2 = 2\n");
        assert!(ctx.is_idle());
    }

    #[test]
    fn test_closed_debugger_fails_waiters_once() {
        let mut ctx = context();
        let (tx, rx) = mpsc::channel();
        ctx.submit(Command::new("continue", true), Some(tx)).unwrap();
        ctx.on_closed();
        ctx.on_closed();

        let results: Vec<_> = rx.try_iter().collect();
        assert_eq!(results.len(), 1);
        assert!(matches!(results[0], Err(SessionError::SessionTerminated)));
        assert!(matches!(
            ctx.enqueue(Command::new("bt", false)),
            Err(SessionError::NotRunning)
        ));
    }

    #[test]
    fn test_detached_context_is_not_running() {
        let mut ctx: DebugContext<Vec<u8>> = DebugContext::detached(PromptDetector::default());
        assert!(matches!(
            ctx.submit(Command::new("run", true), None),
            Err(SessionError::NotRunning)
        ));
    }
}
