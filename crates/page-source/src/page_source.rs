// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use arrow_array::RecordBatch;
use futures::stream::BoxStream;
use futures::{Stream, StreamExt};
use tracing::Span;

use crate::Result;

/// Field of the page source span holding the number of batches produced.
const BATCH_COUNT_FIELD: &str = "batches";
/// Field of the page source span holding the number of rows produced.
const ROW_COUNT_FIELD: &str = "rows";

enum State {
    Open(BoxStream<'static, Result<RecordBatch>>),
    Closed,
}

/// A lazy, pull based stream of record batches read from one split.
///
/// Nothing is decoded until the first batch is requested. Closing releases
/// the underlying reader; it can be called any number of times, and is
/// implied when the stream ends, fails or is dropped.
pub struct PageSource {
    state: State,
    span: Span,
    completed_batches: u64,
    completed_rows: u64,
    delete_filter_loaded: Arc<AtomicBool>,
}

impl PageSource {
    pub(crate) fn new(
        stream: BoxStream<'static, Result<RecordBatch>>,
        span: Span,
        delete_filter_loaded: Arc<AtomicBool>,
    ) -> Self {
        Self {
            state: State::Open(stream),
            span,
            completed_batches: 0,
            completed_rows: 0,
            delete_filter_loaded,
        }
    }

    /// A page source producing no rows.
    pub fn empty() -> Self {
        Self {
            state: State::Closed,
            span: Span::none(),
            completed_batches: 0,
            completed_rows: 0,
            delete_filter_loaded: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Returns the next batch, or `None` once the split is exhausted.
    pub async fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        self.next().await.transpose()
    }

    /// Releases the reader. Calling it again has no effect.
    pub fn close(&mut self) {
        if let State::Open(_) = self.state {
            self.state = State::Closed;
            self.record_counts();
        }
    }

    /// Whether no more batches will be produced.
    pub fn is_finished(&self) -> bool {
        matches!(self.state, State::Closed)
    }

    /// Rows produced so far.
    pub fn completed_rows(&self) -> u64 {
        self.completed_rows
    }

    /// Batches produced so far.
    pub fn completed_batches(&self) -> u64 {
        self.completed_batches
    }

    /// Whether the delete files of the split have been read.
    pub fn delete_filter_loaded(&self) -> bool {
        self.delete_filter_loaded.load(Ordering::Acquire)
    }

    fn record_counts(&self) {
        self.span.record(BATCH_COUNT_FIELD, self.completed_batches);
        self.span.record(ROW_COUNT_FIELD, self.completed_rows);
    }
}

impl Stream for PageSource {
    type Item = Result<RecordBatch>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let State::Open(stream) = &mut this.state else {
            return Poll::Ready(None);
        };

        let polled = {
            let _entered = this.span.enter();
            stream.poll_next_unpin(cx)
        };
        match polled {
            Poll::Ready(Some(Ok(batch))) => {
                this.completed_batches += 1;
                this.completed_rows += batch.num_rows() as u64;
                Poll::Ready(Some(Ok(batch)))
            }
            Poll::Ready(Some(Err(e))) => {
                this.close();
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                this.close();
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for PageSource {
    fn drop(&mut self) {
        self.close();
    }
}

impl std::fmt::Debug for PageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSource")
            .field("finished", &self.is_finished())
            .field("completed_batches", &self.completed_batches)
            .field("completed_rows", &self.completed_rows)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::test_utils::id_name_batch;
    use crate::{Error, ErrorKind};

    fn source(items: Vec<Result<RecordBatch>>) -> PageSource {
        PageSource::new(
            futures::stream::iter(items).boxed(),
            Span::none(),
            Arc::new(AtomicBool::new(false)),
        )
    }

    #[tokio::test]
    async fn test_counts_rows() {
        let mut source = source(vec![
            Ok(id_name_batch(&[1, 2], &["a", "b"])),
            Ok(id_name_batch(&[3], &["c"])),
        ]);
        assert!(!source.is_finished());
        assert_eq!(source.next_batch().await.unwrap().unwrap().num_rows(), 2);
        assert_eq!(source.next_batch().await.unwrap().unwrap().num_rows(), 1);
        assert!(source.next_batch().await.unwrap().is_none());
        assert!(source.is_finished());
        assert_eq!(source.completed_rows(), 3);
        assert_eq!(source.completed_batches(), 2);
    }

    #[tokio::test]
    async fn test_close_twice() {
        let mut source = source(vec![Ok(id_name_batch(&[1], &["a"]))]);
        source.close();
        source.close();
        assert!(source.is_finished());
        assert!(source.next_batch().await.unwrap().is_none());
        assert_eq!(source.completed_rows(), 0);
    }

    #[tokio::test]
    async fn test_error_finishes_source() {
        let mut source = source(vec![
            Err(Error::new(ErrorKind::DataInvalid, "corrupt page")),
            Ok(id_name_batch(&[1], &["a"])),
        ]);
        assert!(source.next_batch().await.is_err());
        assert!(source.is_finished());
        assert!(source.next_batch().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_empty() {
        let source = PageSource::empty();
        assert!(source.is_finished());
        assert!(source.delete_filter_loaded());
        let batches: Vec<_> = source.try_collect().await.unwrap();
        assert!(batches.is_empty());
    }
}
