//! Fork-Join für zwei fehlbare Futures
//!
//! Beide Branches laufen bis zum Ende, keiner wird abgebrochen. Gemeldet wird
//! der Fehler der zuerst fertig war.

use futures::future::{self, Either};
use std::future::Future;
use std::pin::pin;

/// Ergebnis von [`join_both`]
#[derive(Debug, PartialEq, Eq)]
pub enum Joined<A, B, E> {
    AllSucceeded(A, B),
    FirstFailure(E),
}

#[derive(Clone, Copy)]
enum Side {
    Left,
    Right,
}

/// Wartet auf beide Futures und liefert beide Werte oder den ersten Fehler
pub async fn join_both<A, B, E, FA, FB>(left: FA, right: FB) -> Joined<A, B, E>
where
    FA: Future<Output = Result<A, E>>,
    FB: Future<Output = Result<B, E>>,
{
    let left = pin!(left);
    let right = pin!(right);

    match future::select(left, right).await {
        Either::Left((a, right)) => settle(a, right.await, Side::Left),
        Either::Right((b, left)) => settle(left.await, b, Side::Right),
    }
}

fn settle<A, B, E>(a: Result<A, E>, b: Result<B, E>, first: Side) -> Joined<A, B, E> {
    match (a, b) {
        (Ok(a), Ok(b)) => Joined::AllSucceeded(a, b),
        (Err(e), Ok(_)) | (Ok(_), Err(e)) => Joined::FirstFailure(e),
        (Err(left), Err(right)) => match first {
            Side::Left => Joined::FirstFailure(left),
            Side::Right => Joined::FirstFailure(right),
        },
    }
}

// ============================================================================
// TESTS
// ============================================================================
