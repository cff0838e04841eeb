//! Behavioural scenarios for the provisioner lifecycle.

mod provisioner;
