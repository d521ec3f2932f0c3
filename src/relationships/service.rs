//! The follow → match workflow. Every write to `relationships` goes through here.

use sqlx::SqlitePool;
use uuid::Uuid;

use crate::{
    activity::{self, ActivityAction},
    users::directory,
    CoreError, CoreResult,
};

use super::{
    store::{self, Listing},
    Decision, Relationship, RelationshipWithUser,
};

/// Proposes a match from `actor_id` to `target_id`.
///
/// Any existing relationship for the pair blocks a new one, whichever side
/// started it and whatever its status, including `rejected`.
pub async fn send_request(db_pool: &SqlitePool, actor_id: Uuid, target_id: Uuid) -> CoreResult<Relationship> {
    if actor_id == target_id {
        return Err(CoreError::InvalidState("cannot send a request to yourself"));
    }
    if !directory::exists(db_pool, target_id).await? {
        return Err(CoreError::NotFound("user"));
    }

    let mut tx = db_pool.begin().await?;

    let relationship = match store::insert_pending(&mut *tx, actor_id, target_id).await {
        Ok(relationship) => relationship,
        Err(sqlx::Error::Database(err)) if err.is_unique_violation() => {
            let existing = store::find_between(&mut *tx, actor_id, target_id)
                .await?
                .ok_or(CoreError::InvalidState("relationship changed concurrently, retry"))?;
            tracing::debug!(relationship_id = %existing.id, "duplicate request");
            return Err(CoreError::Duplicate(Box::new(existing)));
        }
        Err(sqlx::Error::Database(err)) if err.is_foreign_key_violation() => {
            return Err(CoreError::NotFound("user"));
        }
        Err(err) => return Err(err.into()),
    };

    activity::append(&mut *tx, actor_id, target_id, ActivityAction::Followed).await?;
    tx.commit().await?;

    tracing::info!(relationship_id = %relationship.id, follower = %actor_id, followed = %target_id, "request sent");
    Ok(relationship)
}

/// The recipient accepts or rejects a pending request.
pub async fn respond_to_request(
    db_pool: &SqlitePool,
    actor_id: Uuid,
    relationship_id: Uuid,
    decision: Decision,
) -> CoreResult<Relationship> {
    let mut tx = db_pool.begin().await?;

    let Some(relationship) =
        store::resolve_pending(&mut *tx, relationship_id, actor_id, decision.into()).await?
    else {
        return Err(match store::find_by_id(&mut *tx, relationship_id).await? {
            None => CoreError::NotFound("relationship"),
            Some(current) if current.followed_user_id != actor_id => {
                CoreError::Forbidden("only the recipient may respond to a request")
            }
            Some(current) => CoreError::InvalidTransition(format!("request is already {}", current.status)),
        });
    };

    let action = match decision {
        Decision::Matched => ActivityAction::Followed,
        Decision::Rejected => ActivityAction::Rejected,
    };
    activity::append(&mut *tx, actor_id, relationship.follower_user_id, action).await?;
    tx.commit().await?;

    tracing::info!(relationship_id = %relationship.id, status = %relationship.status, "request answered");
    Ok(relationship)
}

/// The initiator cancels a request that has not been answered yet. The row is
/// deleted; the returned value is what it held.
pub async fn withdraw_request(db_pool: &SqlitePool, actor_id: Uuid, relationship_id: Uuid) -> CoreResult<Relationship> {
    let mut tx = db_pool.begin().await?;

    let Some(relationship) = store::delete_pending(&mut *tx, relationship_id, actor_id).await? else {
        return Err(match store::find_by_id(&mut *tx, relationship_id).await? {
            None => CoreError::NotFound("relationship"),
            Some(current) if current.follower_user_id != actor_id => {
                CoreError::Forbidden("only the sender may withdraw a request")
            }
            Some(_) => CoreError::InvalidState("only pending requests can be withdrawn"),
        });
    };

    activity::append(&mut *tx, actor_id, relationship.followed_user_id, ActivityAction::Withdrew).await?;
    tx.commit().await?;

    tracing::info!(relationship_id = %relationship.id, "request withdrawn");
    Ok(relationship)
}

pub async fn get_matches(db_pool: &SqlitePool, actor_id: Uuid) -> CoreResult<Vec<RelationshipWithUser>> {
    Ok(store::list_with_counterparty(db_pool, actor_id, Listing::Matches).await?)
}

pub async fn get_received_requests(db_pool: &SqlitePool, actor_id: Uuid) -> CoreResult<Vec<RelationshipWithUser>> {
    Ok(store::list_with_counterparty(db_pool, actor_id, Listing::Received).await?)
}

pub async fn get_sent_requests(db_pool: &SqlitePool, actor_id: Uuid) -> CoreResult<Vec<RelationshipWithUser>> {
    Ok(store::list_with_counterparty(db_pool, actor_id, Listing::Sent).await?)
}

pub async fn is_matched(db_pool: &SqlitePool, a: Uuid, b: Uuid) -> CoreResult<bool> {
    Ok(store::is_matched(db_pool, a, b).await?)
}

/// What the client polls while waiting for an answer: the pair's relationship,
/// if any, and whether it is a match.
pub async fn relationship_with(
    db_pool: &SqlitePool,
    actor_id: Uuid,
    other_id: Uuid,
) -> CoreResult<(Option<Relationship>, bool)> {
    if !directory::exists(db_pool, other_id).await? {
        return Err(CoreError::NotFound("user"));
    }
    let relationship = store::find_between(db_pool, actor_id, other_id).await?;
    let matched = is_matched(db_pool, actor_id, other_id).await?;
    Ok((relationship, matched))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{db, relationships::RelationshipStatus, users::directory::seed_user};

    async fn status_of(db_pool: &SqlitePool, id: Uuid) -> Option<RelationshipStatus> {
        store::find_by_id(db_pool, id).await.unwrap().map(|r| r.status)
    }

    #[tokio::test]
    async fn request_starts_pending_and_is_logged() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        assert_eq!(rel.status, RelationshipStatus::Pending);
        assert_eq!(rel.follower_user_id, alice.id);
        assert_eq!(rel.followed_user_id, bob.id);
        assert!(!is_matched(&db_pool, alice.id, bob.id).await.unwrap());

        let log = activity::entries_by(&db_pool, alice.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ActivityAction::Followed);
        assert_eq!(log[0].user_id, alice.id);
        assert_eq!(log[0].receiver_id, bob.id);
    }

    #[tokio::test]
    async fn request_to_missing_user_or_self_fails() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;

        let err = send_request(&db_pool, alice.id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound("user")));

        let err = send_request(&db_pool, alice.id, alice.id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
    }

    #[tokio::test]
    async fn pair_is_unique_in_both_directions() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();

        for (from, to) in [(alice.id, bob.id), (bob.id, alice.id)] {
            match send_request(&db_pool, from, to).await.unwrap_err() {
                CoreError::Duplicate(existing) => assert_eq!(*existing, rel),
                other => panic!("expected duplicate, got {other:?}"),
            }
        }

        // only the first request got logged
        assert!(activity::entries_by(&db_pool, bob.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn rejected_pair_cannot_be_requested_again() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        respond_to_request(&db_pool, bob.id, rel.id, Decision::Rejected).await.unwrap();

        let err = send_request(&db_pool, alice.id, bob.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Duplicate(existing) if existing.status == RelationshipStatus::Rejected));
    }

    #[tokio::test]
    async fn only_recipient_may_respond() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;
        let carol = seed_user(&db_pool, "carol").await;

        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();

        for intruder in [alice.id, carol.id] {
            let err = respond_to_request(&db_pool, intruder, rel.id, Decision::Matched).await.unwrap_err();
            assert!(matches!(err, CoreError::Forbidden(_)));
            assert_eq!(status_of(&db_pool, rel.id).await, Some(RelationshipStatus::Pending));
        }

        let matched = respond_to_request(&db_pool, bob.id, rel.id, Decision::Matched).await.unwrap();
        assert_eq!(matched.status, RelationshipStatus::Matched);
        assert!(is_matched(&db_pool, alice.id, bob.id).await.unwrap());
        assert!(is_matched(&db_pool, bob.id, alice.id).await.unwrap());
        assert!(!is_matched(&db_pool, alice.id, carol.id).await.unwrap());

        let log = activity::entries_by(&db_pool, bob.id).await.unwrap();
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].action, ActivityAction::Followed);
        assert_eq!(log[0].receiver_id, alice.id);
    }

    #[tokio::test]
    async fn answered_requests_are_terminal() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;
        let carol = seed_user(&db_pool, "carol").await;

        let matched = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        respond_to_request(&db_pool, bob.id, matched.id, Decision::Matched).await.unwrap();
        let rejected = send_request(&db_pool, carol.id, bob.id).await.unwrap();
        respond_to_request(&db_pool, bob.id, rejected.id, Decision::Rejected).await.unwrap();

        for (rel, status) in [(matched.id, RelationshipStatus::Matched), (rejected.id, RelationshipStatus::Rejected)] {
            for decision in [Decision::Matched, Decision::Rejected] {
                let err = respond_to_request(&db_pool, bob.id, rel, decision).await.unwrap_err();
                assert!(matches!(err, CoreError::InvalidTransition(_)));
                assert_eq!(status_of(&db_pool, rel).await, Some(status));
            }
        }

        let err = respond_to_request(&db_pool, bob.id, Uuid::now_v7(), Decision::Matched).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound("relationship")));
    }

    #[tokio::test]
    async fn withdraw_only_by_sender_while_pending() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;
        let carol = seed_user(&db_pool, "carol").await;

        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();

        for intruder in [bob.id, carol.id] {
            let err = withdraw_request(&db_pool, intruder, rel.id).await.unwrap_err();
            assert!(matches!(err, CoreError::Forbidden(_)));
        }

        let withdrawn = withdraw_request(&db_pool, alice.id, rel.id).await.unwrap();
        assert_eq!(withdrawn.id, rel.id);
        assert_eq!(status_of(&db_pool, rel.id).await, None);
        assert!(store::find_between(&db_pool, alice.id, bob.id).await.unwrap().is_none());

        let err = withdraw_request(&db_pool, alice.id, rel.id).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound(_)));

        let actions: Vec<_> = activity::entries_by(&db_pool, alice.id)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.action)
            .collect();
        assert_eq!(actions, [ActivityAction::Followed, ActivityAction::Withdrew]);

        // the pair is free again
        send_request(&db_pool, bob.id, alice.id).await.unwrap();
    }

    #[tokio::test]
    async fn matched_request_cannot_be_withdrawn() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        respond_to_request(&db_pool, bob.id, rel.id, Decision::Matched).await.unwrap();

        let err = withdraw_request(&db_pool, alice.id, rel.id).await.unwrap_err();
        assert!(matches!(err, CoreError::InvalidState(_)));
        assert!(is_matched(&db_pool, alice.id, bob.id).await.unwrap());
    }

    #[tokio::test]
    async fn listings_join_the_other_party() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;
        let carol = seed_user(&db_pool, "carol").await;
        let dave = seed_user(&db_pool, "dave").await;

        let ab = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        respond_to_request(&db_pool, bob.id, ab.id, Decision::Matched).await.unwrap();
        send_request(&db_pool, carol.id, alice.id).await.unwrap();
        send_request(&db_pool, alice.id, dave.id).await.unwrap();

        let matches = get_matches(&db_pool, alice.id).await.unwrap();
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].relationship.id, ab.id);
        assert_eq!(matches[0].user.username, "bob");

        let from_bob_side = get_matches(&db_pool, bob.id).await.unwrap();
        assert_eq!(from_bob_side[0].user.username, "alice");

        let received = get_received_requests(&db_pool, alice.id).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].user.username, "carol");

        let sent = get_sent_requests(&db_pool, alice.id).await.unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].user.username, "dave");

        assert!(get_matches(&db_pool, carol.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn polling_reflects_latest_commit() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let (rel, matched) = relationship_with(&db_pool, alice.id, bob.id).await.unwrap();
        assert!(rel.is_none() && !matched);

        let sent = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        let (rel, matched) = relationship_with(&db_pool, bob.id, alice.id).await.unwrap();
        assert_eq!(rel.map(|r| r.id), Some(sent.id));
        assert!(!matched);

        respond_to_request(&db_pool, bob.id, sent.id, Decision::Matched).await.unwrap();
        let (_, matched) = relationship_with(&db_pool, alice.id, bob.id).await.unwrap();
        assert!(matched);

        let err = relationship_with(&db_pool, alice.id, Uuid::now_v7()).await.unwrap_err();
        assert!(matches!(err, CoreError::NotFound("user")));
    }

    async fn fail_activity_inserts(db_pool: &SqlitePool) {
        sqlx::query("CREATE TRIGGER activity_down BEFORE INSERT ON activity_log BEGIN SELECT RAISE(ABORT, 'down'); END")
            .execute(db_pool)
            .await
            .unwrap();
    }

    async fn count(db_pool: &SqlitePool, table: &str) -> i64 {
        let (n,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM {table}"))
            .fetch_one(db_pool)
            .await
            .unwrap();
        n
    }

    #[tokio::test]
    async fn failed_log_write_rolls_back_the_request() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;
        fail_activity_inserts(&db_pool).await;

        let err = send_request(&db_pool, alice.id, bob.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
        assert!(store::find_between(&db_pool, alice.id, bob.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn failed_log_write_leaves_request_pending() {
        let db_pool = db::test_pool().await;
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;
        let rel = send_request(&db_pool, alice.id, bob.id).await.unwrap();
        fail_activity_inserts(&db_pool).await;

        for decision in [Decision::Matched, Decision::Rejected] {
            let err = respond_to_request(&db_pool, bob.id, rel.id, decision).await.unwrap_err();
            assert!(matches!(err, CoreError::Unavailable(_)));
            assert_eq!(status_of(&db_pool, rel.id).await, Some(RelationshipStatus::Pending));
        }

        let err = withdraw_request(&db_pool, alice.id, rel.id).await.unwrap_err();
        assert!(matches!(err, CoreError::Unavailable(_)));
        assert_eq!(status_of(&db_pool, rel.id).await, Some(RelationshipStatus::Pending));
        assert_eq!(count(&db_pool, "activity_log").await, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_requests_and_answers_settle_once() {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("quluub.db").display());
        let db_pool = db::connect(&url, 8).await.unwrap();
        let alice = seed_user(&db_pool, "alice").await;
        let bob = seed_user(&db_pool, "bob").await;

        let sends: Vec<_> = (0..16)
            .map(|i| {
                let db_pool = db_pool.clone();
                let (from, to) = if i % 2 == 0 { (alice.id, bob.id) } else { (bob.id, alice.id) };
                tokio::spawn(async move { send_request(&db_pool, from, to).await })
            })
            .collect();

        let mut created = Vec::new();
        for send in sends {
            match send.await.unwrap() {
                Ok(rel) => created.push(rel),
                Err(CoreError::Duplicate(_)) => {}
                Err(other) => panic!("expected duplicate, got {other:?}"),
            }
        }
        assert_eq!(created.len(), 1);
        assert_eq!(count(&db_pool, "relationships").await, 1);

        let (recipient, rel_id) = (created[0].followed_user_id, created[0].id);
        let answers: Vec<_> = (0..8)
            .map(|_| {
                let db_pool = db_pool.clone();
                tokio::spawn(async move { respond_to_request(&db_pool, recipient, rel_id, Decision::Matched).await })
            })
            .collect();

        let mut wins = 0;
        for answer in answers {
            match answer.await.unwrap() {
                Ok(_) => wins += 1,
                Err(CoreError::InvalidTransition(_)) => {}
                Err(other) => panic!("expected invalid transition, got {other:?}"),
            }
        }
        assert_eq!(wins, 1);
        assert_eq!(status_of(&db_pool, rel_id).await, Some(RelationshipStatus::Matched));
        assert_eq!(count(&db_pool, "activity_log").await, 2);

        db_pool.close().await;
    }
}
