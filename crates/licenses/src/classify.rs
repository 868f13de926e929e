//! Keyword-based license classification

/// SPDX identifiers whose terms allow redistributing documentation and source.
pub const REDISTRIBUTABLE_TYPES: &[&str] = &[
    "AGPL-3.0",
    "Apache-2.0",
    "Artistic-2.0",
    "BlueOak-1.0.0",
    "BSD-0-Clause",
    "BSD-2-Clause",
    "BSD-3-Clause",
    "BSL-1.0",
    "CC-BY-4.0",
    "CC0-1.0",
    "EPL-2.0",
    "GPL-2.0",
    "GPL-3.0",
    "ISC",
    "LGPL-2.1",
    "LGPL-3.0",
    "MIT",
    "MIT-0",
    "MPL-2.0",
    "Unlicense",
    "Zlib",
];

/// Result of classifying one license file.
#[derive(Debug, Clone, PartialEq)]
pub struct Classification {
    /// Detected SPDX identifiers, sorted.
    pub types: Vec<String>,
    /// 0-100: how much of the expected text of the detected licenses was found.
    pub coverage: f64,
}

/// Turns license text into SPDX identifiers.
pub trait LicenseClassifier: Send + Sync {
    fn classify(&self, contents: &[u8]) -> Classification;
}

struct Pattern {
    spdx: &'static str,
    /// All of these must appear for the license to be detected.
    required: &'static [&'static str],
    /// Further phrases expected in a complete copy of the text.
    expected: &'static [&'static str],
    /// Any of these appearing rules the license out.
    excluded: &'static [&'static str],
}

const PATTERNS: &[Pattern] = &[
    Pattern {
        spdx: "MIT",
        required: &["permission is hereby granted, free of charge, to any person obtaining a copy"],
        expected: &[
            "the above copyright notice and this permission notice shall be included",
            "the software is provided \"as is\", without warranty of any kind",
            "to deal in the software without restriction",
        ],
        excluded: &[],
    },
    Pattern {
        spdx: "Apache-2.0",
        required: &["apache license", "version 2.0"],
        expected: &[
            "terms and conditions for use, reproduction, and distribution",
            "grant of copyright license",
            "grant of patent license",
            "redistribution",
            "http://www.apache.org/licenses/",
        ],
        excluded: &[],
    },
    Pattern {
        spdx: "BSD-3-Clause",
        required: &[
            "redistribution and use in source and binary forms",
            "neither the name of",
        ],
        expected: &[
            "redistributions of source code must retain the above copyright",
            "redistributions in binary form must reproduce the above",
            "may be used to endorse or promote products derived from",
            "this software is provided by the copyright holders and contributors",
        ],
        excluded: &[],
    },
    Pattern {
        spdx: "BSD-2-Clause",
        required: &["redistribution and use in source and binary forms"],
        expected: &[
            "redistributions of source code must retain the above copyright",
            "redistributions in binary form must reproduce the above",
            "this software is provided by the copyright holders and contributors",
        ],
        excluded: &["neither the name of", "endorse or promote"],
    },
    Pattern {
        spdx: "ISC",
        required: &["permission to use, copy, modify, and/or distribute this software for any purpose"],
        expected: &[
            "with or without fee is hereby granted",
            "the software is provided \"as is\" and the author disclaims all warranties",
        ],
        excluded: &[],
    },
    Pattern {
        spdx: "MPL-2.0",
        required: &["mozilla public license", "2.0"],
        expected: &["definitions", "license grants and conditions", "this source code form is subject to the terms"],
        excluded: &[],
    },
    Pattern {
        spdx: "AGPL-3.0",
        required: &["gnu affero general public license", "version 3"],
        expected: &["everyone is permitted to copy and distribute verbatim copies", "terms and conditions"],
        excluded: &[],
    },
    Pattern {
        spdx: "LGPL-3.0",
        required: &["gnu lesser general public license", "version 3"],
        expected: &["everyone is permitted to copy and distribute verbatim copies"],
        excluded: &[],
    },
    Pattern {
        spdx: "LGPL-2.1",
        required: &["gnu lesser general public license", "version 2.1"],
        expected: &["everyone is permitted to copy and distribute verbatim copies"],
        excluded: &[],
    },
    Pattern {
        spdx: "GPL-3.0",
        required: &["gnu general public license", "version 3"],
        expected: &["everyone is permitted to copy and distribute verbatim copies", "terms and conditions"],
        excluded: &["lesser general public license", "affero general public license"],
    },
    Pattern {
        spdx: "GPL-2.0",
        required: &["gnu general public license", "version 2"],
        expected: &["everyone is permitted to copy and distribute verbatim copies", "terms and conditions"],
        excluded: &["lesser general public license", "affero general public license", "version 3"],
    },
    Pattern {
        spdx: "Unlicense",
        required: &["this is free and unencumbered software released into the public domain"],
        expected: &["anyone is free to copy, modify, publish, use, compile, sell, or distribute"],
        excluded: &[],
    },
    Pattern {
        spdx: "BSL-1.0",
        required: &["boost software license - version 1.0"],
        expected: &["permission is hereby granted, free of charge, to any person or organization"],
        excluded: &[],
    },
    Pattern {
        spdx: "CC0-1.0",
        required: &["cc0 1.0 universal"],
        expected: &["statement of purpose", "waiver"],
        excluded: &[],
    },
    Pattern {
        spdx: "Zlib",
        required: &[
            "this software is provided 'as-is', without any express or implied",
            "altered source versions must be plainly marked as such",
        ],
        expected: &["this notice may not be removed or altered from any source distribution"],
        excluded: &[],
    },
];

/// Collapse whitespace and lowercase, so phrases match across line wrapping.
fn normalize(contents: &[u8]) -> String {
    let text = String::from_utf8_lossy(contents).to_lowercase();
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Detects licenses by the presence of characteristic phrases.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordClassifier;

impl LicenseClassifier for KeywordClassifier {
    fn classify(&self, contents: &[u8]) -> Classification {
        let text = normalize(contents);
        let mut types = Vec::new();
        let mut found = 0usize;
        let mut total = 0usize;
        for pattern in PATTERNS {
            if !pattern.required.iter().all(|p| text.contains(p))
                || pattern.excluded.iter().any(|p| text.contains(p))
            {
                continue;
            }
            types.push(pattern.spdx.to_string());
            total += pattern.required.len() + pattern.expected.len();
            found += pattern.required.len()
                + pattern.expected.iter().filter(|p| text.contains(*p)).count();
        }
        types.sort();
        #[allow(clippy::cast_precision_loss)]
        let coverage = if total == 0 {
            0.0
        } else {
            (found as f64 / total as f64) * 100.0
        };
        Classification { types, coverage }
    }
}
