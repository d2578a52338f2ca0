mod datamodel;
mod status;
