/*
 * Copyright (c) 2006-Present, Redis Ltd.
 * All rights reserved.
 *
 * Licensed under your choice of the Redis Source Available License 2.0
 * (RSALv2); or (b) the Server Side Public License v1 (SSPLv1); or (c) the
 * GNU Affero General Public License v3 (AGPLv3).
*/

//! The paging processor.
//!
//! The sorter builds a heap of size offset+limit; the pager is responsible
//! for discarding the first `offset` results and passing through the next
//! `limit`. They are separate stages so a cached heap can be re-paged
//! without re-executing the whole query.

use crate::{Context, Error, ResultProcessor, ResultProcessorType, SearchResult};

pub struct Pager {
    offset: usize,
    limit: usize,
    count: usize,
}

impl Pager {
    /// Offset and limit are taken from the user request.
    pub fn new(offset: usize, limit: usize) -> Self {
        Self {
            offset,
            limit,
            count: 0,
        }
    }
}

impl ResultProcessor for Pager {
    fn ty(&self) -> ResultProcessorType {
        ResultProcessorType::Pager
    }

    fn next(&mut self, mut cx: Context<'_>, res: &mut SearchResult) -> Result<Option<()>, Error> {
        // discard results until the offset is reached
        while self.count < self.offset {
            if cx.upstream_next(res)?.is_none() {
                return Ok(None);
            }
            self.count += 1;
            res.clear();
        }

        if self.count >= self.limit + self.offset {
            return Ok(None);
        }

        self.count += 1;
        cx.upstream_next(res)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{self, drain_doc_ids};
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(0, 10, vec![1, 2, 3, 4, 5])]
    #[case(2, 2, vec![3, 4])]
    #[case(4, 10, vec![5])]
    #[case(5, 1, vec![])]
    #[case(9, 3, vec![])]
    #[case(0, 0, vec![])]
    fn pages_the_input_stream(
        #[case] offset: usize,
        #[case] limit: usize,
        #[case] expected: Vec<u64>,
    ) {
        let fixture = test_utils::Fixture::with_docs(&[1, 2, 3, 4, 5]);
        let mut qitr = fixture.query_iterator();
        qitr.push(test_utils::scored_source(&[
            (1, 0.0),
            (2, 0.0),
            (3, 0.0),
            (4, 0.0),
            (5, 0.0),
        ]));
        qitr.push(Pager::new(offset, limit));

        assert_eq!(drain_doc_ids(&mut qitr), expected);
    }

    #[test]
    fn eof_stays_after_limit() {
        let fixture = test_utils::Fixture::with_docs(&[1, 2]);
        let mut qitr = fixture.query_iterator();
        qitr.push(test_utils::scored_source(&[(1, 0.0), (2, 0.0)]));
        qitr.push(Pager::new(0, 1));

        let mut res = SearchResult::new();
        assert_eq!(qitr.next(&mut res), Ok(Some(())));
        assert_eq!(qitr.next(&mut res), Ok(None));
        assert_eq!(qitr.next(&mut res), Ok(None));
    }
}
