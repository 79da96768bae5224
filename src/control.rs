/*
 * Licensed to the Apache Software Foundation (ASF) under one
 * or more contributor license agreements.  See the NOTICE file
 * distributed with this work for additional information
 * regarding copyright ownership.  The ASF licenses this file
 * to you under the Apache License, Version 2.0 (the
 * "License"); you may not use this file except in compliance
 * with the License.  You may obtain a copy of the License at
 *
 *   http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing,
 * software distributed under the License is distributed on an
 * "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
 * KIND, either express or implied.  See the License for the
 * specific language governing permissions and limitations
 * under the License.
 */

//! Parsing of `rabbitmqctl` listing output.
//!
//! The control utility interleaves banner and footer lines with the actual
//! resource names; the filters here drop those sentinels while preserving the
//! enumeration order of everything else. The exact banner wording has varied
//! across broker releases, so the queue filter normalizes each line before
//! matching and both historical exchange banner forms are covered.

use once_cell::sync::Lazy;
use regex::Regex;

/// Prefix the broker reserves for its pre-declared exchanges and queues.
/// Resources under it must never be deleted by a test teardown.
pub const RESERVED_PREFIX: &str = "amq.";

/// Matched against a trimmed, lowercased line; a hit anywhere drops the line.
static UNWANTED_QUEUE_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new("(done|timeout:|listing queues)").expect("queue pattern is valid"));

const UNWANTED_EXCHANGE_LINES: &[&str] = &[
    "Listing exchanges ...",
    "Listing exchanges for vhost / ...",
    "...done.",
];

/// Whether `name` falls under the broker-reserved namespace.
pub fn is_reserved(name: &str) -> bool {
    name.starts_with(RESERVED_PREFIX)
}

/// Extract queue names from raw `list_queues name` output.
pub fn filter_queue_lines(output: &str) -> Vec<String> {
    output
        .split('\n')
        .filter(|line| !line.is_empty())
        .filter(|line| {
            let normalized = line
                .trim_matches(|c| c == '.' || c == ' ')
                .to_lowercase();
            !UNWANTED_QUEUE_PATTERN.is_match(&normalized)
        })
        .map(str::to_string)
        .collect()
}

/// Extract exchange names from raw `list_exchanges name` output.
pub fn filter_exchange_lines(output: &str) -> Vec<String> {
    output
        .split('\n')
        .filter(|line| !line.is_empty() && !UNWANTED_EXCHANGE_LINES.contains(line))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_filter_keeps_names_in_enumeration_order() {
        let output = "Listing queues ...\nfastlane\nslowlane\n...done.\n";
        assert_eq!(filter_queue_lines(output), vec!["fastlane", "slowlane"]);
    }

    #[test]
    fn queue_filter_drops_banner_variants() {
        let output = " Listing queues ...\n...done.\nDone\nTIMEOUT: 60.0\n";
        assert!(filter_queue_lines(output).is_empty());
    }

    #[test]
    fn queue_filter_matches_sentinels_as_substrings() {
        // "timeout:" inside a longer line still drops it.
        let output = "Timeout: 60.0 seconds ...\nfastlane\n";
        assert_eq!(filter_queue_lines(output), vec!["fastlane"]);
    }

    #[test]
    fn queue_filter_drops_empty_lines() {
        let output = "\n\nfastlane\n\n";
        assert_eq!(filter_queue_lines(output), vec!["fastlane"]);
    }

    #[test]
    fn exchange_filter_drops_both_banner_forms() {
        let old = "Listing exchanges ...\namq.direct\n...done.\n";
        let new = "Listing exchanges for vhost / ...\namq.direct\n";
        assert_eq!(filter_exchange_lines(old), vec!["amq.direct"]);
        assert_eq!(filter_exchange_lines(new), vec!["amq.direct"]);
    }

    #[test]
    fn reserved_names_survive_filtering_but_classify_as_reserved() {
        let output = "amq.default\nfastlane\n";
        let names = filter_queue_lines(output);
        assert_eq!(names, vec!["amq.default", "fastlane"]);
        assert!(is_reserved("amq.default"));
        assert!(!is_reserved("fastlane"));
    }

    #[test]
    fn sentinel_lines_are_not_resource_names() {
        // A "...done." footer must never be classified at all.
        assert!(filter_queue_lines("...done.\n").is_empty());
        assert!(filter_exchange_lines("...done.\n").is_empty());
    }
}
