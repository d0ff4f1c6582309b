// Integration tests for chained hooks and call redirection
mod utils;

use bcpatch_core::asm::AsmCompiler;
use bcpatch_core::error::HookError;
use bcpatch_core::hooker::{HookEngine, PatchSession, DEFAULT_PLACEHOLDER};
use bcpatch_core::image::codec::{ImageCodec, ImageFile};
use bcpatch_core::image::{BytecodeImage, Instruction};

use utils::{image_from, Evaluator, Value};

fn game() -> BytecodeImage {
    image_from(&[
        ("scr_main", 0, "push.l 10\ncall scr_score(argc=1)\nret"),
        ("scr_score", 1, "push.a 0\npush.l 1\nadd\nret"),
    ])
}

const ADD_100: &str = "push.a 0\ncall #orig#(argc=1)\npush.l 100\nadd\nret";
const ADD_1000: &str = "push.a 0\ncall #orig#(argc=1)\npush.l 1000\nadd\nret";

#[test]
fn test_two_hooks_run_most_recent_first() {
    let mut image = game();
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::strict();
    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);

    let first = engine.hook("scr_score", ADD_100, DEFAULT_PLACEHOLDER).unwrap();
    let second = engine.hook("scr_score", ADD_1000, DEFAULT_PLACEHOLDER).unwrap();
    assert_eq!(first, "__hook_scr_score_orig_1");
    assert_eq!(second, "__hook_scr_score_orig_2");
    assert_eq!(session.hooks.depth("scr_score"), 2);
    assert_eq!(session.hooks.original("scr_score"), Some(first.as_str()));

    let mut eval = Evaluator::new(&image);
    assert_eq!(eval.run("scr_main", vec![]), Value::Int(1111));
    assert_eq!(
        eval.trace,
        ["scr_main", "scr_score", second.as_str(), first.as_str()]
    );
    assert_eq!(eval.entries(&first), 1);
}

#[test]
fn test_chain_unwinds_to_original_body() {
    let pristine = game();
    let mut image = game();
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::new();
    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
    for _ in 0..3 {
        engine.hook("scr_score", ADD_100, DEFAULT_PLACEHOLDER).unwrap();
    }

    let original = session.hooks.original("scr_score").unwrap();
    assert_eq!(
        image.code(original).unwrap().instructions,
        pristine.code("scr_score").unwrap().instructions
    );

    // Every link calls exactly the one preserved before it.
    let chain = session.hooks.chain("scr_score");
    for pair in chain.windows(2) {
        let newer = image.code(&pair[1]).unwrap();
        assert!(newer.instructions.contains(&Instruction::call(pair[0].as_str(), 1)));
    }
    assert_eq!(Evaluator::new(&image).run("scr_main", vec![]), Value::Int(311));
}

#[test]
fn test_hard_hook_redirects_matching_calls_only() {
    let mut image = image_from(&[
        (
            "scr_main",
            0,
            "push.l 1\ncall scr_score(argc=1)\npush.l 1\npush.l 2\ncall scr_score(argc=2)\nadd\nret",
        ),
        ("scr_score", 1, "push.a 0\npush.l 1\nadd\nret"),
        ("scr_table", 0, "push.f scr_score\nret"),
    ]);
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::strict();
    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);

    let hook = engine
        .hook_function("scr_score", ADD_100, DEFAULT_PLACEHOLDER)
        .unwrap();
    assert_eq!(engine.finalize_hooks().unwrap(), 2);

    let main = image.code("scr_main").unwrap();
    assert!(main.instructions.contains(&Instruction::call(hook.as_str(), 1)));
    assert!(main.instructions.contains(&Instruction::call("scr_score", 2)));
    assert_eq!(
        image.code("scr_table").unwrap().instructions[0],
        Instruction::PushFunction(hook.clone())
    );

    let mut eval = Evaluator::new(&image);
    // (1 + 1 + 100) + (1 + 1)
    assert_eq!(eval.run("scr_main", vec![]), Value::Int(104));
    assert_eq!(eval.entries(&hook), 1);
}

#[test]
fn test_finalize_twice_changes_nothing() {
    let mut image = game();
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::new();
    {
        let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
        engine
            .hard_hook("scr_score", ADD_100, 1, DEFAULT_PLACEHOLDER)
            .unwrap();
        engine.finalize_hooks().unwrap();
    }
    let once = image.clone();

    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
    assert_eq!(engine.finalize_hooks().unwrap(), 0);
    assert_eq!(image, once);
}

#[test]
fn test_soft_and_hard_hooks_compose() {
    let mut image = game();
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::strict();
    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);

    let hard = engine
        .hard_hook("scr_score", ADD_1000, 1, DEFAULT_PLACEHOLDER)
        .unwrap();
    let preserved = engine.hook("scr_score", ADD_100, DEFAULT_PLACEHOLDER).unwrap();
    engine.finalize_hooks().unwrap();

    let mut eval = Evaluator::new(&image);
    assert_eq!(eval.run("scr_main", vec![]), Value::Int(1111));
    assert_eq!(
        eval.trace,
        ["scr_main", hard.as_str(), "scr_score", preserved.as_str()]
    );
}

#[test]
fn test_missing_targets_are_reported() {
    let mut image = game();
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::new();
    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);

    assert_eq!(
        engine.hook("scr_nothing", ADD_100, DEFAULT_PLACEHOLDER),
        Err(HookError::NotFound("scr_nothing".into()))
    );
    assert!(engine
        .hook_asm("scr_nothing", |cursor| {
            cursor.insert_after(Instruction::Nop);
        })
        .is_err());
    assert_eq!(image, game());
}

#[test]
fn test_hooked_image_survives_codec() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cache.win");

    let mut image = game();
    let mut session = PatchSession::new();
    let compiler = AsmCompiler::new();
    let mut engine = HookEngine::new(&mut image, &mut session, &compiler);
    engine.hook("scr_score", ADD_100, DEFAULT_PLACEHOLDER).unwrap();
    engine
        .create_function("scr_bonus", "push.l 5\nret", 0)
        .unwrap();

    let codec = ImageFile::compressed(3);
    codec.write(&image, &path).unwrap();
    let reloaded = codec.read(&path).unwrap();

    assert_eq!(reloaded, image);
    assert_eq!(Evaluator::new(&reloaded).run("scr_main", vec![]), Value::Int(111));
    assert_eq!(Evaluator::new(&reloaded).run("scr_bonus", vec![]), Value::Int(5));
}
