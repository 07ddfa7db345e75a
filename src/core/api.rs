// Copyright (c) 2021 Tangram Robotics Inc. - All Rights Reserved
// Unauthorized copying of this file, via any medium is strictly prohibited
// Proprietary and confidential
// ----------------------------

//! Clients for the database proxy, object storage, Mercury, the PDF renderer,
//! and the email API.

pub(crate) mod database;
pub(crate) mod email;
pub(crate) mod mercury;
pub(crate) mod renderer;
pub(crate) mod storage;
