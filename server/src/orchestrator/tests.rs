use std::sync::Arc;
use std::time::Duration;

use chess::{Side, STARTING_FEN};
use rating::{KFactor, RatingPreview};

use super::*;
use crate::dispatch::{Retryable, SessionTask, TaskHandler, TaskQueue, WorkerConfig, WorkerPool};
use crate::locks::{LeaseLocks, LockError};
use crate::model::{Closing, Game, GameResult, OutcomeLabel, User};
use crate::notify::{Event, SessionState};
use crate::persistence::{GameRepository, MemoryStore, UserRepository};
use crate::test_support::{RecordingNotifier, RecordingQueue};

const GAME: &str = "g1";
const FOOLS_MATE: &str = "rnb1kbnr/pppp1ppp/8/4p3/6Pq/5P2/PPPPP2P/RNBQKBNR w KQkq - 1 3";
const K_FACTOR_DELAY: Duration = Duration::from_secs(3);

fn player(id: &str, login: &str, rating: f64) -> User {
    let mut user = User::new(id, login).with_rating(rating);
    user.sid = Some(format!("sid-{id}"));
    user
}

struct Harness {
    orch: Orchestrator<MemoryStore>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    queue: Arc<RecordingQueue>,
    locks: LeaseLocks,
}

impl Harness {
    async fn new(white: User, black: User) -> Self {
        let store = Arc::new(MemoryStore::new());
        store.create_user(&white).await.unwrap();
        store.create_user(&black).await.unwrap();
        store
            .create_game(&Game::pending(GAME, &white.id, &black.id))
            .await
            .unwrap();

        let notifier = Arc::new(RecordingNotifier::default());
        let queue = Arc::new(RecordingQueue::default());
        let locks = LeaseLocks::new(Duration::from_secs(10), Duration::from_millis(50));
        let orch = Orchestrator::new(
            store.clone(),
            notifier.clone(),
            queue.clone(),
            locks.clone(),
            K_FACTOR_DELAY,
        );
        Self {
            orch,
            store,
            notifier,
            queue,
            locks,
        }
    }

    /// alice (white) and bob (black), both 1500 and provisional.
    async fn even() -> Self {
        Self::new(player("w", "alice", 1500.0), player("b", "bob", 1500.0)).await
    }

    async fn started() -> Self {
        let h = Self::even().await;
        h.orch.start(GAME).await.unwrap();
        h
    }

    /// Run queued tasks, delayed ones included, until nothing is left.
    async fn drain(&self) {
        loop {
            let tasks = self.queue.take();
            if tasks.is_empty() {
                break;
            }
            for (task, _) in tasks {
                self.orch.handle(task).await.unwrap();
            }
        }
    }

    async fn play(&self, user_id: &str, notation: &str) {
        self.orch.apply_move(GAME, user_id, notation).await.unwrap();
    }

    async fn game(&self) -> Game {
        self.store.load_game(GAME).await.unwrap().unwrap()
    }

    async fn user(&self, id: &str) -> User {
        self.store.load_user(id).await.unwrap().unwrap()
    }
}

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}

#[tokio::test]
async fn test_start_greets_each_player_with_own_view() {
    let h = Harness::started().await;

    assert_eq!(
        h.notifier.to_user("sid-w"),
        vec![Event::SessionStarted(SessionState {
            board_state: STARTING_FEN.to_string(),
            color: Side::White,
            opponent_login: "bob".into(),
            opponent_rating: 1500,
            rating_preview: RatingPreview {
                win: 20,
                draw: 0,
                lose: -20
            },
        })]
    );
    match h.notifier.to_user("sid-b").as_slice() {
        [Event::SessionStarted(state)] => {
            assert_eq!(state.color, Side::Black);
            assert_eq!(state.opponent_login, "alice");
        }
        other => panic!("unexpected events: {other:?}"),
    }

    let game = h.game().await;
    assert!(game.is_started);
    assert_eq!(game.board_state, STARTING_FEN);
    assert_eq!(h.user("w").await.cur_game_id.as_deref(), Some(GAME));
    assert_eq!(h.user("b").await.cur_game_id.as_deref(), Some(GAME));
}

#[tokio::test]
async fn test_start_puts_both_players_in_the_room() {
    let h = Harness::started().await;
    assert_eq!(
        h.notifier.members(GAME),
        vec!["sid-w".to_string(), "sid-b".to_string()]
    );
}

#[tokio::test]
async fn test_start_with_missing_player_touches_nobody() {
    let h = Harness::even().await;
    h.store
        .create_game(&Game::pending("g2", "w", "ghost"))
        .await
        .unwrap();

    let err = h.orch.start("g2").await.unwrap_err();
    assert!(matches!(err, TaskError::UserNotFound(ref id) if id == "ghost"));
    assert_eq!(h.user("w").await.cur_game_id, None);
    assert!(!h.store.load_game("g2").await.unwrap().unwrap().is_started);
    assert!(h.notifier.to_user("sid-w").is_empty());
}

#[tokio::test]
async fn test_start_twice_is_a_no_op() {
    let h = Harness::started().await;
    h.play("w", "e4").await;

    h.orch.start(GAME).await.unwrap();

    assert_eq!(h.notifier.to_user("sid-w").len(), 1);
    assert_eq!(h.notifier.to_user("sid-b").len(), 1);
    let game = h.game().await;
    assert_eq!(game.moves, vec!["e4".to_string()]);
    assert_ne!(game.board_state, STARTING_FEN);
}

#[tokio::test]
async fn test_preview_uses_each_players_k_factor() {
    let h = Harness::new(
        player("w", "alice", 2000.0).with_k_factor(KFactor::Standard),
        player("b", "bob", 1600.0),
    )
    .await;
    h.orch.start(GAME).await.unwrap();

    let preview_of = |sid: &str| match h.notifier.to_user(sid).as_slice() {
        [Event::SessionStarted(state)] => (state.rating_preview, state.opponent_rating),
        other => panic!("unexpected events: {other:?}"),
    };
    assert_eq!(
        preview_of("sid-w"),
        (RatingPreview { win: 1, draw: -8, lose: -18 }, 1600)
    );
    assert_eq!(
        preview_of("sid-b"),
        (RatingPreview { win: 36, draw: 16, lose: -3 }, 2000)
    );
}

#[tokio::test]
async fn test_legal_move_is_persisted_and_broadcast() {
    let h = Harness::started().await;
    h.play("w", " e4 ").await;

    let game = h.game().await;
    assert_eq!(game.moves, vec!["e4".to_string()]);
    assert_eq!(chess::turn_owner(&game.board_state).unwrap(), Side::Black);
    assert_eq!(
        h.notifier.to_room(GAME),
        vec![Event::SessionMoveApplied {
            move_notation: "e4".into()
        }]
    );
    assert!(h.queue.peek().is_empty());
}

#[tokio::test]
async fn test_rejected_moves_change_nothing() {
    let h = Harness::started().await;
    let before = h.game().await;

    // Wrong turn, observer, illegal notation, garbage.
    h.play("b", "e5").await;
    h.play("stranger", "e4").await;
    h.play("w", "e5").await;
    h.play("w", "Zz9").await;

    assert_eq!(h.game().await, before);
    assert!(h.notifier.to_room(GAME).is_empty());
    assert!(h.queue.peek().is_empty());
}

#[tokio::test]
async fn test_move_before_start_is_ignored() {
    let h = Harness::even().await;
    h.play("w", "e4").await;

    let game = h.game().await;
    assert!(!game.is_started);
    assert!(game.moves.is_empty());
    assert!(h.notifier.to_room(GAME).is_empty());
}

#[tokio::test]
async fn test_fools_mate_finalizes_black_win() {
    let h = Harness::started().await;
    for (user, san) in [("w", "f3"), ("b", "e5"), ("w", "g4"), ("b", "Qh4#")] {
        h.play(user, san).await;
    }

    assert_eq!(
        h.queue.peek(),
        vec![SessionTask::FinalizeSession {
            game_id: GAME.into(),
            result: GameResult::BlackWin,
            reason: "checkmate".into(),
            settle_ratings: true,
        }]
    );
    h.drain().await;

    let game = h.game().await;
    assert!(game.is_finished);
    assert_eq!(game.result, Some(GameResult::BlackWin));
    assert_eq!(game.reason, "checkmate");
    assert_eq!(game.moves.len(), 4);
    assert!(game.finished_at.is_some());

    assert!(h.notifier.to_user("sid-w").contains(&Event::SessionEnded {
        outcome_label: OutcomeLabel::Lost,
        reason: "checkmate".into(),
    }));
    assert!(h.notifier.to_user("sid-b").contains(&Event::SessionEnded {
        outcome_label: OutcomeLabel::Won,
        reason: "checkmate".into(),
    }));

    let (white, black) = (h.user("w").await, h.user("b").await);
    assert_eq!(white.rating, 1480.0);
    assert_eq!(black.rating, 1520.0);
    assert_eq!(white.games_played, 1);
    assert_eq!(black.games_played, 1);
    assert_eq!(white.cur_game_id, None);
    assert_eq!(black.cur_game_id, None);
}

#[tokio::test]
async fn test_terminal_position_resubmits_finalize() {
    let h = Harness::started().await;
    let mut game = h.game().await;
    game.board_state = FOOLS_MATE.to_string();
    h.store.save_game(&game).await.unwrap();

    h.play("w", "e4").await;

    assert_eq!(h.game().await, game);
    assert!(matches!(
        h.queue.peek().as_slice(),
        [SessionTask::FinalizeSession {
            result: GameResult::BlackWin,
            ..
        }]
    ));
}

#[tokio::test]
async fn test_even_game_white_wins() {
    let h = Harness::started().await;
    h.orch
        .finalize(GAME, GameResult::WhiteWin, "", true)
        .await
        .unwrap();
    h.drain().await;

    assert_eq!(h.user("w").await.rating, 1520.0);
    assert_eq!(h.user("b").await.rating, 1480.0);
}

#[tokio::test]
async fn test_uneven_game_uses_own_k_factor() {
    let h = Harness::new(
        player("w", "alice", 2000.0).with_k_factor(KFactor::Standard),
        player("b", "bob", 1600.0),
    )
    .await;
    h.orch.start(GAME).await.unwrap();
    h.orch
        .finalize(GAME, GameResult::WhiteWin, "resignation", true)
        .await
        .unwrap();
    h.drain().await;

    assert_close(h.user("w").await.rating, 2001.818);
    assert_close(h.user("b").await.rating, 1596.364);
}

#[tokio::test]
async fn test_finalize_twice_settles_once() {
    let h = Harness::started().await;
    h.orch
        .finalize(GAME, GameResult::Draw, "agreement", true)
        .await
        .unwrap();
    let first = h.queue.take();
    h.orch
        .finalize(GAME, GameResult::WhiteWin, "late", true)
        .await
        .unwrap();

    assert!(h.queue.peek().is_empty());
    assert_eq!(h.game().await.result, Some(GameResult::Draw));
    assert_eq!(h.user("w").await.games_played, 1);
    assert_eq!(h.user("b").await.games_played, 1);
    assert_eq!(h.notifier.to_user("sid-w").len(), 2);

    // Redeliver every settlement task twice.
    for (task, _) in first.iter().chain(first.iter()) {
        h.orch.handle(task.clone()).await.unwrap();
    }
    assert_eq!(h.store.settlement_count(), 4);
    assert_eq!(h.user("w").await.rating, 1500.0);
}

#[tokio::test]
async fn test_finalize_retry_after_failed_submit_replays_snapshot() {
    let h = Harness::started().await;
    h.queue.fail_next_delayed();

    let err = h
        .orch
        .finalize(GAME, GameResult::WhiteWin, "resignation", true)
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    let game = h.game().await;
    assert!(!game.is_finished);
    assert!(game.closing.is_some());

    // White's settlement got out before the failure and lands first.
    h.drain().await;
    assert_eq!(h.user("w").await.rating, 1520.0);

    h.orch
        .finalize(GAME, GameResult::WhiteWin, "resignation", true)
        .await
        .unwrap();
    h.drain().await;

    assert_eq!(h.user("w").await.rating, 1520.0);
    assert_eq!(h.user("b").await.rating, 1480.0);
    assert_eq!(h.user("w").await.games_played, 1);
    let ended = |sid: &str| {
        h.notifier
            .to_user(sid)
            .iter()
            .filter(|event| matches!(event, Event::SessionEnded { .. }))
            .count()
    };
    assert_eq!(ended("sid-w"), 1);
    assert_eq!(ended("sid-b"), 1);
    assert!(h.game().await.is_finished);
}

#[tokio::test]
async fn test_retry_keeps_the_first_result() {
    let h = Harness::started().await;
    h.queue.fail_next_delayed();
    h.orch
        .finalize(GAME, GameResult::BlackWin, "checkmate", true)
        .await
        .unwrap_err();

    h.orch
        .finalize(GAME, GameResult::WhiteWin, "resignation", true)
        .await
        .unwrap();
    let game = h.game().await;
    assert_eq!(game.result, Some(GameResult::BlackWin));
    assert_eq!(game.reason, "checkmate");
}

#[tokio::test]
async fn test_move_during_unfinished_finalize_resubmits_it() {
    let h = Harness::started().await;
    let mut game = h.game().await;
    game.closing = Some(Closing {
        result: GameResult::Draw,
        reason: "agreement".into(),
        deltas: None,
    });
    h.store.save_game(&game).await.unwrap();

    h.play("w", "e4").await;
    h.orch.send_message(GAME, "alice", "still there?").await.unwrap();

    assert_eq!(h.game().await, game);
    assert!(h.notifier.to_room(GAME).is_empty());
    assert_eq!(
        h.queue.peek(),
        vec![SessionTask::FinalizeSession {
            game_id: GAME.into(),
            result: GameResult::Draw,
            reason: "agreement".into(),
            settle_ratings: false,
        }]
    );
}

#[tokio::test]
async fn test_finalize_schedules_settlement_tasks() {
    let h = Harness::started().await;
    h.orch
        .finalize(GAME, GameResult::BlackWin, "timeout", true)
        .await
        .unwrap();

    let tasks = h.queue.take();
    let settles: Vec<_> = tasks
        .iter()
        .filter_map(|(task, delay)| match task {
            SessionTask::SettleRating { user_id, delta, .. } => {
                assert_eq!(*delay, None);
                Some((user_id.clone(), *delta))
            }
            _ => None,
        })
        .collect();
    assert_eq!(settles, vec![("w".to_string(), -20.0), ("b".to_string(), 20.0)]);

    let recomputes: Vec<_> = tasks
        .iter()
        .filter(|(task, _)| matches!(task, SessionTask::RecomputeKFactor { .. }))
        .collect();
    assert_eq!(recomputes.len(), 2);
    assert!(recomputes.iter().all(|(_, delay)| *delay == Some(K_FACTOR_DELAY)));
}

#[tokio::test]
async fn test_room_stays_closed_after_finalize() {
    let h = Harness::started().await;
    h.orch
        .finalize(GAME, GameResult::Draw, "", true)
        .await
        .unwrap();
    assert!(h.notifier.is_closed(GAME));

    h.orch.send_message(GAME, "alice", "gg").await.unwrap();
    h.play("w", "e4").await;
    assert!(h.notifier.to_room(GAME).is_empty());
}

#[tokio::test]
async fn test_interrupted_game_is_counted_but_not_rated() {
    let h = Harness::started().await;
    h.orch
        .finalize(GAME, GameResult::Interrupted, "server_shutdown", true)
        .await
        .unwrap();

    let tasks = h.queue.peek();
    assert!(!tasks
        .iter()
        .any(|task| matches!(task, SessionTask::SettleRating { .. })));
    assert_eq!(tasks.len(), 2);
    assert!(h.notifier.to_user("sid-b").contains(&Event::SessionEnded {
        outcome_label: OutcomeLabel::Interrupted,
        reason: "server_shutdown".into(),
    }));

    h.drain().await;
    let white = h.user("w").await;
    assert_eq!(white.rating, 1500.0);
    assert_eq!(white.games_played, 1);
}

#[tokio::test]
async fn test_unrated_finalize_enqueues_nothing() {
    let h = Harness::started().await;
    h.orch
        .finalize(GAME, GameResult::WhiteWin, "", false)
        .await
        .unwrap();

    assert!(h.queue.peek().is_empty());
    assert_eq!(h.user("w").await.games_played, 1);
    assert_eq!(h.user("w").await.rating, 1500.0);
}

#[tokio::test]
async fn test_thirtieth_game_lowers_k_factor() {
    let mut veteran = player("w", "alice", 1500.0);
    veteran.games_played = 29;
    let h = Harness::new(veteran, player("b", "bob", 1500.0)).await;
    h.orch.start(GAME).await.unwrap();
    h.orch
        .finalize(GAME, GameResult::Draw, "", true)
        .await
        .unwrap();
    h.drain().await;

    let white = h.user("w").await;
    assert_eq!(white.games_played, 30);
    assert_eq!(white.k_factor, KFactor::Standard);
    assert_eq!(h.user("b").await.k_factor, KFactor::Provisional);
}

#[tokio::test]
async fn test_k_factor_below_master_threshold_is_kept() {
    let h = Harness::even().await;
    let mut user = player("s", "carol", 2399.0).with_k_factor(KFactor::Standard);
    user.games_played = 30;
    h.store.create_user(&user).await.unwrap();

    h.orch.recompute_k_factor("s").await.unwrap();
    h.orch.recompute_k_factor("s").await.unwrap();
    assert_eq!(h.user("s").await.k_factor, KFactor::Standard);
}

#[tokio::test]
async fn test_reconnect_sends_fresh_snapshot_to_player_only() {
    let h = Harness::started().await;
    h.play("w", "e4").await;
    let board = h.game().await.board_state;

    h.orch.reconnect(GAME, "b").await.unwrap();
    h.orch.reconnect(GAME, "stranger").await.unwrap();

    match h.notifier.to_user("sid-b").as_slice() {
        [Event::SessionStarted(_), Event::SessionResumed(state)] => {
            assert_eq!(state.board_state, board);
            assert_eq!(state.color, Side::Black);
        }
        other => panic!("unexpected events: {other:?}"),
    }
    assert_eq!(h.notifier.to_user("sid-w").len(), 1);
}

#[tokio::test]
async fn test_reconnect_outside_play_is_silent() {
    let h = Harness::even().await;
    h.orch.reconnect(GAME, "w").await.unwrap();
    assert!(h.notifier.to_user("sid-w").is_empty());

    h.orch.start(GAME).await.unwrap();
    h.orch
        .finalize(GAME, GameResult::Draw, "", false)
        .await
        .unwrap();
    h.notifier.clear();
    h.orch.reconnect(GAME, "w").await.unwrap();
    assert!(h.notifier.to_user("sid-w").is_empty());
}

#[tokio::test]
async fn test_resign_awards_the_opponent() {
    let h = Harness::started().await;
    h.orch.resign(GAME, "stranger").await.unwrap();
    assert!(h.queue.peek().is_empty());

    h.orch.resign(GAME, "b").await.unwrap();
    assert_eq!(
        h.queue.peek(),
        vec![SessionTask::FinalizeSession {
            game_id: GAME.into(),
            result: GameResult::WhiteWin,
            reason: "resignation".into(),
            settle_ratings: true,
        }]
    );
    h.drain().await;
    assert_eq!(h.game().await.result, Some(GameResult::WhiteWin));

    h.orch.resign(GAME, "w").await.unwrap();
    assert!(h.queue.peek().is_empty());
}

#[tokio::test]
async fn test_chat_is_trimmed_and_truncated() {
    let h = Harness::started().await;
    h.orch.send_message(GAME, "alice", "   ").await.unwrap();
    h.orch.send_message(GAME, "alice", "  hi  ").await.unwrap();
    h.orch
        .send_message(GAME, "bob", &"ж".repeat(600))
        .await
        .unwrap();

    let events = h.notifier.to_room(GAME);
    assert_eq!(events.len(), 2);
    assert_eq!(
        events[0],
        Event::ChatMessage {
            sender: "alice".into(),
            message: "hi".into()
        }
    );
    match &events[1] {
        Event::ChatMessage { message, .. } => assert_eq!(message.chars().count(), 500),
        other => panic!("unexpected event: {other:?}"),
    }

    let err = h.orch.send_message("nope", "alice", "hi").await.unwrap_err();
    assert!(matches!(err, TaskError::GameNotFound(_)));
}

#[tokio::test]
async fn test_bind_channel_reports_current_game() {
    let h = Harness::even().await;
    let binding = h.orch.bind_channel("w", "sid-new").await.unwrap();
    assert_eq!(
        binding,
        ChannelBinding {
            login: "alice".into(),
            cur_game_id: None
        }
    );

    h.orch.start(GAME).await.unwrap();
    let binding = h.orch.bind_channel("w", "sid-newer").await.unwrap();
    assert_eq!(binding.cur_game_id.as_deref(), Some(GAME));
    assert_eq!(h.user("w").await.sid.as_deref(), Some("sid-newer"));
    assert_eq!(h.notifier.to_user("sid-new").len(), 1);
}

#[tokio::test]
async fn test_unknown_entities_are_not_retryable() {
    let h = Harness::even().await;
    let err = h.orch.start("nope").await.unwrap_err();
    assert!(matches!(err, TaskError::GameNotFound(_)));
    assert!(!err.is_retryable());

    let err = h.orch.settle_rating(GAME, "ghost", 5.0).await.unwrap_err();
    assert!(matches!(err, TaskError::UserNotFound(_)));
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_corrupt_board_aborts_move() {
    let h = Harness::started().await;
    let mut game = h.game().await;
    game.board_state = "not a fen".into();
    h.store.save_game(&game).await.unwrap();

    let err = h.orch.apply_move(GAME, "w", "e4").await.unwrap_err();
    assert!(matches!(err, TaskError::CorruptBoard { .. }));
    assert!(!err.is_retryable());
}

#[tokio::test(start_paused = true)]
async fn test_lock_timeout_is_retryable_and_mutates_nothing() {
    let h = Harness::even().await;
    let held = h.locks.acquire_game(GAME).await.unwrap();

    let err = h.orch.start(GAME).await.unwrap_err();
    assert!(matches!(
        err,
        TaskError::Lock(LockError::Timeout { .. })
    ));
    assert!(err.is_retryable());
    assert!(!h.game().await.is_started);
    assert!(h.notifier.to_user("sid-w").is_empty());

    drop(held);
    h.orch.start(GAME).await.unwrap();
    assert!(h.game().await.is_started);
}

#[tokio::test]
async fn test_recover_pending_enqueues_unstarted_games() {
    let h = Harness::even().await;
    h.store
        .create_game(&Game::pending("g2", "b", "w"))
        .await
        .unwrap();
    assert_eq!(h.orch.recover_pending().await.unwrap(), 2);
    h.drain().await;

    assert!(h.game().await.is_started);
    assert_eq!(h.orch.recover_pending().await.unwrap(), 0);
}

/// Orchestrator driven by a real worker pool, for races between tasks.
struct Pooled {
    orch: Arc<Orchestrator<MemoryStore>>,
    store: Arc<MemoryStore>,
    notifier: Arc<RecordingNotifier>,
    queue: Arc<dyn TaskQueue>,
    _workers: Vec<tokio::task::JoinHandle<()>>,
}

impl Pooled {
    async fn started() -> Self {
        let store = Arc::new(MemoryStore::new());
        store.create_user(&player("w", "alice", 1500.0)).await.unwrap();
        store.create_user(&player("b", "bob", 1500.0)).await.unwrap();
        store
            .create_game(&Game::pending(GAME, "w", "b"))
            .await
            .unwrap();

        let pool = WorkerPool::new(WorkerConfig {
            workers: 4,
            max_attempts: 5,
            retry_backoff: Duration::from_millis(5),
        });
        let queue: Arc<dyn TaskQueue> = Arc::new(pool.sender());
        let notifier = Arc::new(RecordingNotifier::default());
        let orch = Arc::new(Orchestrator::new(
            store.clone(),
            notifier.clone(),
            queue.clone(),
            LeaseLocks::new(Duration::from_secs(10), Duration::from_secs(2)),
            Duration::from_millis(10),
        ));
        let workers = pool.spawn(orch.clone());
        orch.start(GAME).await.unwrap();

        Self {
            orch,
            store,
            notifier,
            queue,
            _workers: workers,
        }
    }

    fn submit_move(&self, user_id: &str, san: &str) {
        self.queue
            .submit(SessionTask::ApplySessionMove {
                game_id: GAME.into(),
                user_id: user_id.into(),
                move_notation: san.into(),
            })
            .unwrap();
    }

    async fn game(&self) -> Game {
        self.store.load_game(GAME).await.unwrap().unwrap()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_moves_apply_exactly_one() {
    let p = Pooled::started().await;
    for san in ["e4", "d4", "c4", "Nf3"] {
        p.submit_move("w", san);
    }

    tokio::time::timeout(Duration::from_secs(5), async {
        while p.game().await.moves.is_empty() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    // Let the losing moves reach a worker and be turned away.
    tokio::time::sleep(Duration::from_millis(200)).await;

    let game = p.game().await;
    assert_eq!(game.moves.len(), 1);
    assert_eq!(chess::turn_owner(&game.board_state).unwrap(), Side::Black);
    assert_eq!(p.notifier.to_room(GAME).len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_mating_move_racing_resignation_settles_once() {
    let p = Pooled::started().await;
    for (user, san) in [("w", "f3"), ("b", "e5"), ("w", "g4")] {
        p.orch.apply_move(GAME, user, san).await.unwrap();
    }

    p.submit_move("b", "Qh4#");
    p.queue
        .submit(SessionTask::FinalizeSession {
            game_id: GAME.into(),
            result: GameResult::WhiteWin,
            reason: "resignation".into(),
            settle_ratings: true,
        })
        .unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while !p.game().await.is_finished || p.store.settlement_count() < 4 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(200)).await;

    let game = p.game().await;
    let result = game.result.unwrap();
    assert_eq!(game.closing.as_ref().map(|c| c.result), Some(result));
    if game.moves.len() == 3 {
        assert_eq!(result, GameResult::WhiteWin);
    } else {
        assert_eq!(game.moves.len(), 4);
        assert!(matches!(result, GameResult::WhiteWin | GameResult::BlackWin));
    }

    let (white, black) = (
        p.store.load_user("w").await.unwrap().unwrap(),
        p.store.load_user("b").await.unwrap().unwrap(),
    );
    assert_eq!(p.store.settlement_count(), 4);
    assert_eq!((white.games_played, black.games_played), (1, 1));
    assert_close(white.rating + black.rating, 3000.0);
    let winner = match result {
        GameResult::WhiteWin => &white,
        _ => &black,
    };
    assert_eq!(winner.rating, 1520.0);

    let ended = p
        .notifier
        .to_user("sid-w")
        .into_iter()
        .filter(|event| matches!(event, Event::SessionEnded { .. }))
        .count();
    assert_eq!(ended, 1);
}
