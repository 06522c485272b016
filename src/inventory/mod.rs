// Jetporch
// Copyright (C) 2023 - Michael DeHaan <michael@michaeldehaan.net> + contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// long with this program.  If not, see <http://www.gnu.org/licenses/>.

pub mod group;
pub mod host;
pub mod instance;
pub mod inventory;
pub mod manifest;
pub mod yaml_loader;

pub use group::{Group, GroupsCollection};
pub use host::{Host, HostsCollection};
pub use instance::{Instance, InstancesCollection};
pub use inventory::Inventory;
pub use manifest::Manifest;
