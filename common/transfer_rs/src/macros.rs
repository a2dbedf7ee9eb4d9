// Copyright (C) 2024 Huawei Device Co., Ltd.
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Configuration macros for feature-gated conditional compilation.

/// Conditionally includes code when the "reqwest" feature is enabled.
///
/// Applies `#[cfg(feature = "reqwest")]` to all provided items.
///
/// # Examples
///
/// ```ignore
/// cfg_reqwest! {
///     mod reqwest_engine;
///     pub use reqwest_engine::ReqwestEngine;
/// }
/// ```
macro_rules! cfg_reqwest {
    ($($item:item)*) => {
        $(
            #[cfg(feature = "reqwest")]
            $item
        )*
    }
}
